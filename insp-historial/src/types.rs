//! Wire and view types for the historial pipeline
//!
//! Raw types mirror what the backend returns and are deliberately lenient:
//! ids may be JSON strings or numbers, actor fields may be nested objects or
//! bare names, and an unparseable timestamp is treated as absent instead of
//! failing the whole listing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Actor slot on a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorTipo {
    Proveedor,
    Transportista,
}

impl ActorTipo {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorTipo::Proveedor => "proveedor",
            ActorTipo::Transportista => "transportista",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "proveedor" => Some(ActorTipo::Proveedor),
            "transportista" => Some(ActorTipo::Transportista),
            _ => None,
        }
    }
}

impl fmt::Display for ActorTipo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Weak reference to a catalog actor (lookup only)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActorRef {
    #[serde(default, deserialize_with = "de::id_or_empty")]
    pub id: String,
    #[serde(default, alias = "name", alias = "razon_social")]
    pub nombre: String,
    #[serde(default, alias = "ruc", alias = "identificacion")]
    pub documento: Option<String>,
}

/// Submission summary as embedded in historial listings
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct SubmissionLite {
    #[serde(deserialize_with = "de::id")]
    pub id: String,
    #[serde(default)]
    pub tipo_fase: Option<String>,
    #[serde(default)]
    pub placa_vehiculo: Option<String>,
    #[serde(default)]
    pub finalizado: bool,
    #[serde(default, deserialize_with = "de::lenient_datetime")]
    pub fecha_cierre: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de::opt_id")]
    pub proveedor_id: Option<String>,
    #[serde(default, deserialize_with = "de::actor")]
    pub proveedor: Option<ActorRef>,
    #[serde(default, deserialize_with = "de::opt_id")]
    pub transportista_id: Option<String>,
    #[serde(default, deserialize_with = "de::actor")]
    pub transportista: Option<ActorRef>,
    /// Questionnaire title
    #[serde(default, deserialize_with = "de::title")]
    pub cuestionario: Option<String>,
}

impl SubmissionLite {
    /// Actor in the given slot, with its id completed from the sibling
    /// `*_id` field when the nested object did not carry one
    pub fn actor(&self, slot: ActorTipo) -> Option<ActorRef> {
        let (actor, id) = match slot {
            ActorTipo::Proveedor => (&self.proveedor, &self.proveedor_id),
            ActorTipo::Transportista => (&self.transportista, &self.transportista_id),
        };

        actor.as_ref().map(|a| {
            let mut a = a.clone();
            if a.id.is_empty() {
                if let Some(id) = id {
                    a.id = id.clone();
                }
            }
            a
        })
    }

    /// Both actor slots carry data
    pub fn has_complete_actors(&self) -> bool {
        self.proveedor.is_some() && self.transportista.is_some()
    }
}

/// One answer of a hydrated submission
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubmissionAnswer {
    #[serde(default, deserialize_with = "de::opt_id")]
    pub pregunta_id: Option<String>,
    #[serde(default)]
    pub pregunta: Option<String>,
    #[serde(default)]
    pub valor: serde_json::Value,
}

/// Fully hydrated submission returned by `GET /submissions/{id}/`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubmissionDetail {
    #[serde(flatten)]
    pub submission: SubmissionLite,
    #[serde(default, alias = "respuestas")]
    pub answers: Vec<SubmissionAnswer>,
}

/// One regulador record as returned by `GET /historial/reguladores/`
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct RawHistorialItem {
    #[serde(deserialize_with = "de::id")]
    pub regulador_id: String,
    #[serde(default)]
    pub placa_vehiculo: Option<String>,
    #[serde(default, deserialize_with = "de::opt_id")]
    pub contenedor: Option<String>,
    #[serde(default, deserialize_with = "de::opt_id")]
    pub muelle: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_datetime")]
    pub ultima_fecha_cierre: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fase1: Option<SubmissionLite>,
    #[serde(default)]
    pub fase2: Option<SubmissionLite>,
}

impl RawHistorialItem {
    pub fn fase1_id(&self) -> Option<&str> {
        self.fase1.as_ref().map(|f| f.id.as_str())
    }

    pub fn fase2_id(&self) -> Option<&str> {
        self.fase2.as_ref().map(|f| f.id.as_str())
    }

    /// Best available plate: item, then fase1, then fase2
    pub fn raw_plate(&self) -> Option<&str> {
        [
            self.placa_vehiculo.as_deref(),
            self.fase1.as_ref().and_then(|f| f.placa_vehiculo.as_deref()),
            self.fase2.as_ref().and_then(|f| f.placa_vehiculo.as_deref()),
        ]
        .into_iter()
        .flatten()
        .find(|p| !p.trim().is_empty())
    }
}

/// Completion state of a regulador
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Estado {
    Completo,
    Pendiente,
}

impl Estado {
    /// `Completo` iff both phases are present
    pub fn from_phases(fase1_id: Option<&str>, fase2_id: Option<&str>) -> Self {
        if fase1_id.is_some() && fase2_id.is_some() {
            Estado::Completo
        } else {
            Estado::Pendiente
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Estado::Completo => "completo",
            Estado::Pendiente => "pendiente",
        }
    }
}

impl fmt::Display for Estado {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Enriched, flattened row handed to the UI and the CSV exporter
///
/// The derived `Ord` is a canonical total order over every field. The row
/// merger uses it as the last tie-break so merges never depend on input order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct HistorialRow {
    pub regulador_id: String,
    pub placa: String,
    pub contenedor: Option<String>,
    pub muelle: Option<String>,
    pub estado: Estado,
    pub fase1_id: Option<String>,
    pub fase2_id: Option<String>,
    pub fecha_entrada: Option<DateTime<Utc>>,
    pub fecha_salida: Option<DateTime<Utc>>,
    pub ultima_fecha_cierre: Option<DateTime<Utc>>,
    pub tiempo_estadia_min: Option<i64>,
    pub tiempo_estadia_humano: Option<String>,
    pub proveedor: Option<ActorRef>,
    pub transportista: Option<ActorRef>,
    pub cuestionario_fase1: Option<String>,
    pub cuestionario_fase2: Option<String>,
}

impl HistorialRow {
    pub fn actor(&self, slot: ActorTipo) -> Option<&ActorRef> {
        match slot {
            ActorTipo::Proveedor => self.proveedor.as_ref(),
            ActorTipo::Transportista => self.transportista.as_ref(),
        }
    }

    /// Recompute `estado` from the phase ids
    pub fn refresh_estado(&mut self) {
        self.estado = Estado::from_phases(self.fase1_id.as_deref(), self.fase2_id.as_deref());
    }

    /// Most recent timestamp the row carries
    pub fn latest_activity(&self) -> Option<DateTime<Utc>> {
        [self.ultima_fecha_cierre, self.fecha_salida, self.fecha_entrada]
            .into_iter()
            .flatten()
            .max()
    }
}

/// Lenient field deserializers for backend payloads
mod de {
    use super::ActorRef;
    use chrono::{DateTime, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    fn value_to_id(value: Value) -> Option<String> {
        match value {
            Value::String(s) => {
                let s = s.trim().to_string();
                (!s.is_empty()).then_some(s)
            }
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Required id: string or number
    pub fn id<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        let value = Value::deserialize(d)?;
        value_to_id(value).ok_or_else(|| D::Error::custom("expected a non-empty string or number id"))
    }

    /// Optional id, text or number; anything else is absent
    pub fn opt_id<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(Option::<Value>::deserialize(d)?.and_then(value_to_id))
    }

    pub fn id_or_empty<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(opt_id(d)?.unwrap_or_default())
    }

    /// RFC 3339 timestamp; unparseable values become `None`
    pub fn lenient_datetime<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        Ok(Option::<Value>::deserialize(d)?
            .and_then(|v| v.as_str().map(str::to_string))
            .and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
            .map(|dt| dt.with_timezone(&Utc)))
    }

    /// Nested actor object or bare name
    ///
    /// A bare number is a foreign key without actor data and is treated as
    /// absent, so the submission qualifies for hydration.
    pub fn actor<'de, D: Deserializer<'de>>(d: D) -> Result<Option<ActorRef>, D::Error> {
        match Option::<Value>::deserialize(d)? {
            Some(Value::String(name)) if !name.trim().is_empty() => Ok(Some(ActorRef {
                id: String::new(),
                nombre: name.trim().to_string(),
                documento: None,
            })),
            Some(value @ Value::Object(_)) => serde_json::from_value::<ActorRef>(value)
                .map(Some)
                .map_err(D::Error::custom),
            _ => Ok(None),
        }
    }

    /// Questionnaire title from `{nombre}`, `{titulo}` or a bare string
    pub fn title<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        let title = match Option::<Value>::deserialize(d)? {
            Some(Value::String(s)) => Some(s),
            Some(Value::Object(map)) => ["nombre", "titulo", "title"]
                .iter()
                .find_map(|k| map.get(*k).and_then(Value::as_str).map(str::to_string)),
            _ => None,
        };
        Ok(title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()))
    }
}
