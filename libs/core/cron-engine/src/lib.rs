// INICIO DEL ARCHIVO [libs/core/cron-engine/src/lib.rs]
/*!
 * =================================================================
 * APARATO: CHRONOS EXPRESSION ENGINE (V2.4 - FIVE FIELD SOVEREIGN)
 * CLASIFICACIÓN: CORE LOGIC (ESTRATO L1)
 * RESPONSABILIDAD: PARSEO Y CORRESPONDENCIA DE EXPRESIONES CRON
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. DIALECTO CANÓNICO: minuto, hora, día-del-mes, mes, día-de-semana.
 *    Acepta '*', literales, listas por coma, rangos 'a-b' y saltos '*' + '/n'.
 * 2. DOMINGO DUAL: 0 y 7 denotan ambos Domingo; el parser normaliza a 0.
 * 3. SEMÁNTICA CONJUNTIVA: los cinco campos deben corresponder (AND),
 *    siguiendo el contrato del planificador original de la plataforma.
 *
 * # Mathematical Proof (Bitmask Membership):
 * Cada campo se compila a una máscara u64. La correspondencia de una
 * frontera de minuto se reduce a cinco pruebas de bit O(1), permitiendo
 * que el daemon Chronos evalúe miles de schedules por tick sin presión
 * de asignación.
 * =================================================================
 */

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CronParseError {
    /// La expresión no contiene exactamente cinco campos separados por espacios.
    #[error("[L1_CRON_FAULT]: FIELD_COUNT_VIOLATION -> expected 5 fields, found {0}")]
    WrongFieldCount(usize),

    /// Un campo individual viola la gramática o su rango soberano.
    #[error("[L1_CRON_FAULT]: FIELD_REJECTED -> {field_label}: {detail}")]
    InvalidField {
        field_label: &'static str,
        detail: String,
    },
}

/// Descriptor de rango por campo: (etiqueta, mínimo, máximo, normaliza_domingo).
const FIELD_CONTRACTS: [(&str, u8, u8, bool); 5] = [
    ("minute", 0, 59, false),
    ("hour", 0, 23, false),
    ("day_of_month", 1, 31, false),
    ("month", 1, 12, false),
    ("day_of_week", 0, 7, true),
];

/**
 * Expresión cron compilada a máscaras de pertenencia.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpression {
    minute_mask: u64,
    hour_mask: u64,
    day_of_month_mask: u64,
    month_mask: u64,
    day_of_week_mask: u64,
    source_expression: String,
}

impl CronExpression {
    /**
     * Compila una expresión de cinco campos a su forma de máscaras.
     *
     * # Errors:
     * - `CronParseError::WrongFieldCount`: conteo de campos distinto de cinco.
     * - `CronParseError::InvalidField`: gramática o rango violados en un campo.
     */
    pub fn parse(expression: &str) -> Result<Self, CronParseError> {
        let raw_fields: Vec<&str> = expression.split_whitespace().collect();
        if raw_fields.len() != 5 {
            return Err(CronParseError::WrongFieldCount(raw_fields.len()));
        }

        let mut compiled_masks = [0u64; 5];
        for (slot_index, ((field_label, minimum, maximum, normalizes_sunday), raw_field)) in
            FIELD_CONTRACTS.iter().zip(raw_fields.iter()).enumerate()
        {
            compiled_masks[slot_index] =
                compile_field_mask(raw_field, field_label, *minimum, *maximum, *normalizes_sunday)?;
        }

        Ok(Self {
            minute_mask: compiled_masks[0],
            hour_mask: compiled_masks[1],
            day_of_month_mask: compiled_masks[2],
            month_mask: compiled_masks[3],
            day_of_week_mask: compiled_masks[4],
            source_expression: expression.trim().to_string(),
        })
    }

    /// Expresión textual original, normalizada por bordes.
    pub fn source(&self) -> &str {
        &self.source_expression
    }

    /**
     * Evalúa la correspondencia conjuntiva contra un instante ya situado
     * en la zona horaria del schedule.
     */
    pub fn matches<Z: TimeZone>(&self, local_moment: &DateTime<Z>) -> bool {
        let sunday_zero_weekday = local_moment.weekday().num_days_from_sunday() as u8;

        mask_contains(self.minute_mask, local_moment.minute() as u8)
            && mask_contains(self.hour_mask, local_moment.hour() as u8)
            && mask_contains(self.day_of_month_mask, local_moment.day() as u8)
            && mask_contains(self.month_mask, local_moment.month() as u8)
            && mask_contains(self.day_of_week_mask, sunday_zero_weekday)
    }

    /// Proyecta una frontera UTC hacia una zona nominal y evalúa la correspondencia.
    pub fn matches_in_zone(&self, utc_boundary: DateTime<Utc>, schedule_zone: Tz) -> bool {
        self.matches(&utc_boundary.with_timezone(&schedule_zone))
    }
}

#[inline]
fn mask_contains(field_mask: u64, candidate_value: u8) -> bool {
    field_mask & (1u64 << candidate_value) != 0
}

/**
 * Compila un campo individual (listas, rangos, saltos, comodín) a máscara.
 */
fn compile_field_mask(
    raw_field: &str,
    field_label: &'static str,
    minimum: u8,
    maximum: u8,
    normalizes_sunday: bool,
) -> Result<u64, CronParseError> {
    let mut accumulated_mask = 0u64;

    for list_segment in raw_field.split(',') {
        if list_segment.is_empty() {
            return Err(CronParseError::InvalidField {
                field_label,
                detail: "EMPTY_LIST_SEGMENT".into(),
            });
        }

        let (range_segment, step_interval) = split_step(list_segment, field_label)?;

        let (range_start, range_end) = if range_segment == "*" {
            (minimum, maximum)
        } else if let Some((raw_start, raw_end)) = range_segment.split_once('-') {
            let start = parse_bounded(raw_start, field_label, minimum, maximum)?;
            let end = parse_bounded(raw_end, field_label, minimum, maximum)?;
            if start > end {
                return Err(CronParseError::InvalidField {
                    field_label,
                    detail: format!("INVERTED_RANGE: {}-{}", start, end),
                });
            }
            (start, end)
        } else {
            let literal = parse_bounded(range_segment, field_label, minimum, maximum)?;
            (literal, literal)
        };

        let mut cursor = range_start;
        while cursor <= range_end {
            let normalized_value = if normalizes_sunday && cursor == 7 { 0 } else { cursor };
            accumulated_mask |= 1u64 << normalized_value;
            cursor = match cursor.checked_add(step_interval) {
                Some(next) => next,
                None => break,
            };
        }
    }

    Ok(accumulated_mask)
}

/// Separa el sufijo de salto '/n' y lo valida como entero positivo.
fn split_step<'a>(
    list_segment: &'a str,
    field_label: &'static str,
) -> Result<(&'a str, u8), CronParseError> {
    match list_segment.split_once('/') {
        None => Ok((list_segment, 1)),
        Some((range_segment, raw_step)) => {
            let step_interval: u8 = raw_step.parse().map_err(|_| CronParseError::InvalidField {
                field_label,
                detail: format!("NON_NUMERIC_STEP: '{}'", raw_step),
            })?;
            if step_interval == 0 {
                return Err(CronParseError::InvalidField {
                    field_label,
                    detail: "ZERO_STEP".into(),
                });
            }
            Ok((range_segment, step_interval))
        }
    }
}

fn parse_bounded(
    raw_value: &str,
    field_label: &'static str,
    minimum: u8,
    maximum: u8,
) -> Result<u8, CronParseError> {
    let parsed_value: u8 = raw_value.parse().map_err(|_| CronParseError::InvalidField {
        field_label,
        detail: format!("NON_NUMERIC_VALUE: '{}'", raw_value),
    })?;

    if parsed_value < minimum || parsed_value > maximum {
        return Err(CronParseError::InvalidField {
            field_label,
            detail: format!("OUT_OF_RANGE: {} not in {}..={}", parsed_value, minimum, maximum),
        });
    }

    Ok(parsed_value)
}

// FIN DEL ARCHIVO [libs/core/cron-engine/src/lib.rs]
