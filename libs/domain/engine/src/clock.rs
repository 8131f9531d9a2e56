// [libs/domain/engine/src/clock.rs]
/*!
 * =================================================================
 * APARATO: CLOCK SEAM (V1.2 - DETERMINISTIC TIME)
 * CLASIFICACIÓN: DOMAIN SERVICES (ESTRATO L2)
 * RESPONSABILIDAD: ABSTRACCIÓN DE TIEMPO PARA MOTOR Y DAEMONS
 *
 * El ejecutor (pausa entre reintentos) y el daemon Chronos (fronteras de
 * minuto) consumen esta costura; el Proving Grounds inyecta relojes
 * deterministas sin tocar el reloj de pared.
 * =================================================================
 */

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
    async fn sleep(&self, pause_duration: Duration);
}

/// Reloj de producción respaldado por el reloj de pared y el timer de Tokio.
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, pause_duration: Duration) {
        tokio::time::sleep(pause_duration).await;
    }
}
