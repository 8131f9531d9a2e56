// [libs/infra/db-turso/src/repositories/connected_system_repository.rs]
/*!
 * =================================================================
 * APARATO: CONNECTED SYSTEM REPOSITORY (V4.2 - CIPHERTEXT COLUMN)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: CUSTODIA DE LA COLUMNA DE CREDENCIALES CIFRADAS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. COLUMN DISCIPLINE: El repositorio lee y escribe EXCLUSIVAMENTE
 *    'credentials_encrypted' (más 'name' para el lookup). El resto de
 *    la fila pertenece a la gobernanza de conexiones de la plataforma.
 * 2. AT-REST ENCODING: El payload auto-descriptivo viaja base64 en una
 *    columna TEXT, el convenio de payloads opacos del Ledger.
 * 3. ATOMIC ROTATION: La rotación de llave maestra compromete TODAS las
 *    filas re-cifradas en una transacción; un fallo por fila aborta todo.
 * =================================================================
 */

use crate::errors::DbError;
use crate::TursoClient;
use libsql::params;
use tracing::{info, instrument};

/**
 * Repositorio de autoridad única para `connected_systems.credentials_encrypted`.
 */
pub struct ConnectedSystemRepository {
    database_client: TursoClient,
}

impl ConnectedSystemRepository {
    pub fn new(client: TursoClient) -> Self {
        Self {
            database_client: client,
        }
    }

    /// Inscribe la fila del sistema si no existe (bootstrap y Proving Grounds).
    pub async fn ensure_system(&self, system_name: &str, system_type: &str) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;

        connection
            .execute(
                "INSERT OR IGNORE INTO connected_systems (name, system_type) VALUES (?1, ?2)",
                params![system_name, system_type],
            )
            .await?;

        Ok(())
    }

    /**
     * Reemplaza atómicamente el ciphertext del sistema.
     *
     * # Errors:
     * `DbError::ConnectedSystemNotFound` si la fila del sistema no existe.
     */
    #[instrument(skip(self, ciphertext_base64))]
    pub async fn store_ciphertext(
        &self,
        system_name: &str,
        ciphertext_base64: &str,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;

        let rows_affected_count = connection
            .execute(
                "UPDATE connected_systems \
                 SET credentials_encrypted = ?2, updated_at = CURRENT_TIMESTAMP \
                 WHERE name = ?1",
                params![system_name, ciphertext_base64],
            )
            .await?;

        if rows_affected_count == 0 {
            return Err(DbError::ConnectedSystemNotFound);
        }

        info!("🔐 [VAULT_COLUMN]: Ciphertext replaced for system [{}].", system_name);
        Ok(())
    }

    /// Ciphertext vigente, o None si el sistema no existe o no porta secreto.
    pub async fn fetch_ciphertext(&self, system_name: &str) -> Result<Option<String>, DbError> {
        let connection = self.database_client.get_connection()?;

        let mut query_result = connection
            .query(
                "SELECT credentials_encrypted FROM connected_systems WHERE name = ?1",
                params![system_name],
            )
            .await?;

        match query_result.next().await? {
            Some(data_row) => Ok(data_row.get::<String>(0).ok()),
            None => Ok(None),
        }
    }

    /// Limpia únicamente el ciphertext; la fila del sistema permanece.
    pub async fn clear_ciphertext(&self, system_name: &str) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;

        connection
            .execute(
                "UPDATE connected_systems \
                 SET credentials_encrypted = NULL, updated_at = CURRENT_TIMESTAMP \
                 WHERE name = ?1",
                params![system_name],
            )
            .await?;

        Ok(())
    }

    /// Consulta de metadatos: ¿el sistema porta secreto? Jamás descifra.
    pub async fn has_ciphertext(&self, system_name: &str) -> Result<bool, DbError> {
        let connection = self.database_client.get_connection()?;

        let mut query_result = connection
            .query(
                "SELECT 1 FROM connected_systems \
                 WHERE name = ?1 AND credentials_encrypted IS NOT NULL",
                params![system_name],
            )
            .await?;

        Ok(query_result.next().await?.is_some())
    }

    /// Inventario completo de (sistema, ciphertext) para la rotación de llave.
    pub async fn all_ciphertexts(&self) -> Result<Vec<(String, String)>, DbError> {
        let connection = self.database_client.get_connection()?;

        let mut query_result = connection
            .query(
                "SELECT name, credentials_encrypted FROM connected_systems \
                 WHERE credentials_encrypted IS NOT NULL ORDER BY name",
                (),
            )
            .await?;

        let mut ciphertext_inventory = Vec::new();
        while let Some(data_row) = query_result.next().await? {
            ciphertext_inventory.push((data_row.get(0)?, data_row.get(1)?));
        }

        Ok(ciphertext_inventory)
    }

    /**
     * Compromete el inventario re-cifrado completo en UNA transacción.
     * Consumido por la rotación de llave maestra: o rotan todas las filas
     * o no rota ninguna.
     */
    #[instrument(skip(self, reencrypted_inventory))]
    pub async fn replace_all_ciphertexts(
        &self,
        reencrypted_inventory: &[(String, String)],
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;

        let database_transaction = connection
            .transaction()
            .await
            .map_err(|_| DbError::TransactionError)?;

        for (system_name, ciphertext_base64) in reencrypted_inventory {
            let rows_affected_count = database_transaction
                .execute(
                    "UPDATE connected_systems \
                     SET credentials_encrypted = ?2, updated_at = CURRENT_TIMESTAMP \
                     WHERE name = ?1",
                    params![system_name.clone(), ciphertext_base64.clone()],
                )
                .await?;

            if rows_affected_count == 0 {
                // La fila se esfumó a mitad de rotación: aborto total.
                return Err(DbError::ConnectedSystemNotFound);
            }
        }

        database_transaction
            .commit()
            .await
            .map_err(|_| DbError::TransactionError)?;

        info!("🔄 [VAULT_ROTATION]: {} ciphertext rows re-sealed atomically.", reencrypted_inventory.len());
        Ok(())
    }
}
