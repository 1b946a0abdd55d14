//! Raw item → display row projection

use crate::normalize::normalize_plate;
use crate::types::{ActorRef, ActorTipo, Estado, HistorialRow, RawHistorialItem, SubmissionLite};
use chrono::{DateTime, Utc};
use insp_common::human_time::format_minutes_opt;

/// Stay length in whole minutes, clamped at zero
///
/// `None` unless both ends are known.
pub fn stay_minutes(
    entrada: Option<DateTime<Utc>>,
    salida: Option<DateTime<Utc>>,
) -> Option<i64> {
    match (entrada, salida) {
        (Some(entrada), Some(salida)) => Some((salida - entrada).num_minutes().max(0)),
        _ => None,
    }
}

/// Actor for a slot, preferring the exit phase
fn project_actor(
    fase1: Option<&SubmissionLite>,
    fase2: Option<&SubmissionLite>,
    slot: ActorTipo,
) -> Option<ActorRef> {
    fase2
        .and_then(|f| f.actor(slot))
        .or_else(|| fase1.and_then(|f| f.actor(slot)))
}

/// Build the display row for one (possibly hydrated) item
pub fn enrich_item(item: &RawHistorialItem) -> HistorialRow {
    let fase1 = item.fase1.as_ref();
    let fase2 = item.fase2.as_ref();

    let fase1_id = fase1.map(|f| f.id.clone());
    let fase2_id = fase2.map(|f| f.id.clone());
    let fecha_entrada = fase1.and_then(|f| f.fecha_cierre);
    let fecha_salida = fase2.and_then(|f| f.fecha_cierre);
    let tiempo_estadia_min = stay_minutes(fecha_entrada, fecha_salida);

    HistorialRow {
        regulador_id: item.regulador_id.clone(),
        placa: normalize_plate(item.raw_plate().unwrap_or_default()),
        contenedor: item.contenedor.clone(),
        muelle: item.muelle.clone(),
        estado: Estado::from_phases(fase1_id.as_deref(), fase2_id.as_deref()),
        fase1_id,
        fase2_id,
        fecha_entrada,
        fecha_salida,
        ultima_fecha_cierre: item.ultima_fecha_cierre,
        tiempo_estadia_min,
        tiempo_estadia_humano: format_minutes_opt(tiempo_estadia_min),
        proveedor: project_actor(fase1, fase2, ActorTipo::Proveedor),
        transportista: project_actor(fase1, fase2, ActorTipo::Transportista),
        cuestionario_fase1: fase1.and_then(|f| f.cuestionario.clone()),
        cuestionario_fase2: fase2.and_then(|f| f.cuestionario.clone()),
    }
}

pub fn enrich_all(items: &[RawHistorialItem]) -> Vec<HistorialRow> {
    items.iter().map(enrich_item).collect()
}
