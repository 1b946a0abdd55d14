//! Query codec
//!
//! Maps the historial filter/sort/page state to and from a flat string-keyed
//! parameter map (URL query string, saved view, ...). Fields equal to their
//! default are omitted on encode and restored on decode, so
//! `decode(&encode(&q)) == q` holds for every reachable state.
//!
//! Reachable means: `page >= 1`, `page_size` within
//! `1..=MAX_PAGE_SIZE` and `actor_id`, when present, non-empty. Decoding
//! clamps or drops values outside those ranges, and ignores unknown keys.

use crate::types::ActorTipo;
use crate::view::{ActorFilter, EstadoFiltro, SortDir, SortKey, ViewOptions};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Flat parameter map produced by [`encode`]
pub type FlatParams = BTreeMap<String, String>;

/// Default page size
pub const DEFAULT_PAGE_SIZE: u32 = 25;

/// Largest accepted page size
pub const MAX_PAGE_SIZE: u32 = 500;

const DATE_FORMAT: &str = "%Y-%m-%d";

const KEY_FECHA_DESDE: &str = "fecha_desde";
const KEY_FECHA_HASTA: &str = "fecha_hasta";
const KEY_SOLO_COMPLETADOS: &str = "solo_completados";
const KEY_ESTADO: &str = "estado";
const KEY_SEARCH: &str = "search";
const KEY_ACTOR_TIPO: &str = "actor_tipo";
const KEY_ACTOR_ID: &str = "actor_id";
const KEY_ACTOR_TEXT: &str = "actor_text";
const KEY_SORT: &str = "sort";
const KEY_DIR: &str = "dir";
const KEY_PAGE: &str = "page";
const KEY_PAGE_SIZE: &str = "page_size";

/// Complete browsing state of the historial screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistorialQuery {
    pub fecha_desde: Option<NaiveDate>,
    pub fecha_hasta: Option<NaiveDate>,
    pub solo_completados: bool,
    pub estado: EstadoFiltro,
    pub search: String,
    pub actor_tipo: Option<ActorTipo>,
    pub actor_id: Option<String>,
    pub actor_text: String,
    pub sort: SortKey,
    pub dir: SortDir,
    /// 1-based
    pub page: u32,
    pub page_size: u32,
}

impl Default for HistorialQuery {
    fn default() -> Self {
        Self {
            fecha_desde: None,
            fecha_hasta: None,
            solo_completados: false,
            estado: EstadoFiltro::Todos,
            search: String::new(),
            actor_tipo: None,
            actor_id: None,
            actor_text: String::new(),
            sort: SortKey::Reciente,
            dir: SortDir::Desc,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Server-side subset of the query, sent to `GET /historial/reguladores/`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistorialParams {
    pub fecha_desde: Option<NaiveDate>,
    pub fecha_hasta: Option<NaiveDate>,
    pub solo_completados: bool,
}

impl HistorialParams {
    /// Query-string pairs; absent filters are not sent
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(d) = self.fecha_desde {
            pairs.push((KEY_FECHA_DESDE, d.format(DATE_FORMAT).to_string()));
        }
        if let Some(d) = self.fecha_hasta {
            pairs.push((KEY_FECHA_HASTA, d.format(DATE_FORMAT).to_string()));
        }
        if self.solo_completados {
            pairs.push((KEY_SOLO_COMPLETADOS, "true".to_string()));
        }
        pairs
    }
}

impl HistorialQuery {
    /// Parameters for the backend listing
    pub fn server_params(&self) -> HistorialParams {
        HistorialParams {
            fecha_desde: self.fecha_desde,
            fecha_hasta: self.fecha_hasta,
            solo_completados: self.solo_completados,
        }
    }

    /// In-memory filter/sort/page options
    pub fn view_options(&self) -> ViewOptions {
        ViewOptions {
            estado: self.estado,
            search: self.search.clone(),
            actor: self.actor_tipo.map(|tipo| ActorFilter {
                tipo,
                id: self.actor_id.clone(),
                text: self.actor_text.clone(),
            }),
            sort: self.sort,
            dir: self.dir,
            page: self.page as usize,
            page_size: self.page_size as usize,
        }
    }
}

/// Encode state into a flat map, omitting defaults
pub fn encode(query: &HistorialQuery) -> FlatParams {
    let defaults = HistorialQuery::default();
    let mut params = FlatParams::new();

    let mut put = |key: &str, value: String| {
        params.insert(key.to_string(), value);
    };

    if let Some(d) = query.fecha_desde {
        put(KEY_FECHA_DESDE, d.format(DATE_FORMAT).to_string());
    }
    if let Some(d) = query.fecha_hasta {
        put(KEY_FECHA_HASTA, d.format(DATE_FORMAT).to_string());
    }
    if query.solo_completados {
        put(KEY_SOLO_COMPLETADOS, "1".to_string());
    }
    if query.estado != defaults.estado {
        put(KEY_ESTADO, query.estado.as_str().to_string());
    }
    if !query.search.is_empty() {
        put(KEY_SEARCH, query.search.clone());
    }
    if let Some(tipo) = query.actor_tipo {
        put(KEY_ACTOR_TIPO, tipo.as_str().to_string());
    }
    if let Some(id) = &query.actor_id {
        put(KEY_ACTOR_ID, id.clone());
    }
    if !query.actor_text.is_empty() {
        put(KEY_ACTOR_TEXT, query.actor_text.clone());
    }
    if query.sort != defaults.sort {
        put(KEY_SORT, query.sort.as_str().to_string());
    }
    if query.dir != defaults.dir {
        put(KEY_DIR, query.dir.as_str().to_string());
    }
    if query.page != defaults.page {
        put(KEY_PAGE, query.page.to_string());
    }
    if query.page_size != defaults.page_size {
        put(KEY_PAGE_SIZE, query.page_size.to_string());
    }

    params
}

/// Decode a flat map, filling defaults for missing or invalid values
pub fn decode(params: &FlatParams) -> HistorialQuery {
    let defaults = HistorialQuery::default();
    let get = |key: &str| params.get(key).map(String::as_str);

    let date = |key: &str| get(key).and_then(|v| NaiveDate::parse_from_str(v.trim(), DATE_FORMAT).ok());

    HistorialQuery {
        fecha_desde: date(KEY_FECHA_DESDE),
        fecha_hasta: date(KEY_FECHA_HASTA),
        solo_completados: get(KEY_SOLO_COMPLETADOS).map(parse_flag).unwrap_or(false),
        estado: get(KEY_ESTADO)
            .and_then(EstadoFiltro::parse)
            .unwrap_or(defaults.estado),
        search: get(KEY_SEARCH).unwrap_or_default().to_string(),
        actor_tipo: get(KEY_ACTOR_TIPO).and_then(ActorTipo::parse),
        actor_id: get(KEY_ACTOR_ID)
            .filter(|v| !v.is_empty())
            .map(str::to_string),
        actor_text: get(KEY_ACTOR_TEXT).unwrap_or_default().to_string(),
        sort: get(KEY_SORT).and_then(SortKey::parse).unwrap_or(defaults.sort),
        dir: get(KEY_DIR).and_then(SortDir::parse).unwrap_or(defaults.dir),
        page: get(KEY_PAGE)
            .and_then(|v| v.trim().parse::<u32>().ok())
            .map(|p| p.max(1))
            .unwrap_or(defaults.page),
        page_size: get(KEY_PAGE_SIZE)
            .and_then(|v| v.trim().parse::<u32>().ok())
            .map(|s| s.clamp(1, MAX_PAGE_SIZE))
            .unwrap_or(defaults.page_size),
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "si" | "sí" | "yes"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_query() -> HistorialQuery {
        HistorialQuery {
            fecha_desde: NaiveDate::from_ymd_opt(2024, 1, 1),
            fecha_hasta: NaiveDate::from_ymd_opt(2024, 1, 31),
            solo_completados: true,
            estado: EstadoFiltro::Pendiente,
            search: "pbx 12".to_string(),
            actor_tipo: Some(ActorTipo::Transportista),
            actor_id: Some("77".to_string()),
            actor_text: "andes".to_string(),
            sort: SortKey::Placa,
            dir: SortDir::Asc,
            page: 4,
            page_size: 50,
        }
    }

    #[test]
    fn test_default_encodes_to_empty_map() {
        assert!(encode(&HistorialQuery::default()).is_empty());
        assert_eq!(decode(&FlatParams::new()), HistorialQuery::default());
    }

    #[test]
    fn test_round_trip_default() {
        let q = HistorialQuery::default();
        assert_eq!(decode(&encode(&q)), q);
    }

    #[test]
    fn test_round_trip_non_default() {
        let q = full_query();
        assert_eq!(decode(&encode(&q)), q);
    }

    #[test]
    fn test_round_trip_each_field_alone() {
        let full = full_query();
        let variants = vec![
            HistorialQuery { fecha_desde: full.fecha_desde, ..Default::default() },
            HistorialQuery { fecha_hasta: full.fecha_hasta, ..Default::default() },
            HistorialQuery { solo_completados: true, ..Default::default() },
            HistorialQuery { estado: EstadoFiltro::Completo, ..Default::default() },
            HistorialQuery { search: "  spaced ".to_string(), ..Default::default() },
            HistorialQuery { actor_tipo: Some(ActorTipo::Proveedor), ..Default::default() },
            HistorialQuery { actor_id: Some("5".to_string()), ..Default::default() },
            HistorialQuery { actor_text: "ñandú".to_string(), ..Default::default() },
            HistorialQuery { sort: SortKey::Placa, ..Default::default() },
            HistorialQuery { dir: SortDir::Asc, ..Default::default() },
            HistorialQuery { page: 2, ..Default::default() },
            HistorialQuery { page_size: 1, ..Default::default() },
        ];

        for q in variants {
            let encoded = encode(&q);
            assert_eq!(encoded.len(), 1, "expected one key for {:?}", q);
            assert_eq!(decode(&encoded), q);
        }
    }

    #[test]
    fn test_encoded_keys() {
        let encoded = encode(&full_query());
        assert_eq!(encoded.get("fecha_desde").map(String::as_str), Some("2024-01-01"));
        assert_eq!(encoded.get("estado").map(String::as_str), Some("pendiente"));
        assert_eq!(encoded.get("sort").map(String::as_str), Some("placa"));
        assert_eq!(encoded.get("dir").map(String::as_str), Some("asc"));
        assert_eq!(encoded.get("page").map(String::as_str), Some("4"));
    }

    #[test]
    fn test_invalid_values_fall_back_to_defaults() {
        let mut params = FlatParams::new();
        params.insert("estado".into(), "archivado".into());
        params.insert("sort".into(), "color".into());
        params.insert("page".into(), "0".into());
        params.insert("page_size".into(), "100000".into());
        params.insert("fecha_desde".into(), "01/02/2024".into());
        params.insert("actor_id".into(), "".into());
        params.insert("unknown".into(), "ignored".into());

        let q = decode(&params);
        assert_eq!(q.estado, EstadoFiltro::Todos);
        assert_eq!(q.sort, SortKey::Reciente);
        assert_eq!(q.page, 1);
        assert_eq!(q.page_size, MAX_PAGE_SIZE);
        assert_eq!(q.fecha_desde, None);
        assert_eq!(q.actor_id, None);
    }

    #[test]
    fn test_server_params_pairs() {
        let pairs = full_query().server_params().to_query_pairs();
        assert_eq!(
            pairs,
            vec![
                ("fecha_desde", "2024-01-01".to_string()),
                ("fecha_hasta", "2024-01-31".to_string()),
                ("solo_completados", "true".to_string()),
            ]
        );
        assert!(HistorialParams::default().to_query_pairs().is_empty());
    }

    #[test]
    fn test_view_options_projection() {
        let opts = full_query().view_options();
        let actor = opts.actor.unwrap();
        assert_eq!(actor.tipo, ActorTipo::Transportista);
        assert_eq!(actor.id.as_deref(), Some("77"));
        assert_eq!(opts.page, 4);
        assert_eq!(opts.page_size, 50);

        assert!(HistorialQuery::default().view_options().actor.is_none());
    }
}
