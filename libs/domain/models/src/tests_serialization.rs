// [libs/domain/models/src/tests_serialization.rs]
/**
 * =================================================================
 * APARATO: DOMAIN SERIALIZATION TEST (V3.0 - INTEGRATION LEVEL)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L2-MODELS)
 * RESPONSABILIDAD: CERTIFICACIÓN DE PARIDAD JSON DE CONTRATOS DE PROCESO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SCOPE DISCIPLINE: Vincula appos_domain_models como entidad externa,
 *    cumpliendo con la física de tests de integración.
 * 2. DATA INTEGRITY: Valida que los discriminadores de nodo (Serde Tag)
 *    y las políticas de error preserven su forma snake_case en tránsito.
 * 3. HYGIENE: Erradicación total de 'crate::' por nombres nominales.
 * =================================================================
 */
