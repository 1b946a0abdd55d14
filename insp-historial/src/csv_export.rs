//! CSV export of historial rows
//!
//! RFC 4180 output: comma delimited, `\r\n` line endings, fields quoted only
//! when they contain a comma, double quote, CR or LF. The downloadable blob
//! is UTF-8 with a byte order mark so spreadsheet tools pick up the accents
//! in the header.

use crate::dedupe::dedupe_rows;
use crate::types::{ActorRef, HistorialRow};
use chrono::{DateTime, Utc};

pub const CSV_HEADER: [&str; 18] = [
    "Regulador ID",
    "Placa",
    "Contenedor",
    "Muelle",
    "Estado",
    "Fase 1 ID",
    "Fase 2 ID",
    "Fecha entrada",
    "Fecha salida",
    "Última fecha cierre",
    "Tiempo estadía (min)",
    "Tiempo estadía (humano)",
    "Cuestionario Fase 1",
    "Cuestionario Fase 2",
    "Proveedor",
    "Doc. Proveedor",
    "Transportista",
    "Doc. Transportista",
];

const LINE_END: &str = "\r\n";
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Export file ready for download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvExport {
    /// `historial_reguladores_<YYYYMMDD_HHMM>.csv`
    pub filename: String,
    /// BOM followed by the CSV text
    pub bytes: Vec<u8>,
}

/// Quote a field when RFC 4180 requires it
pub fn escape_field(value: &str) -> String {
    if value.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn fmt_date(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|d| d.format(DATE_FORMAT).to_string())
        .unwrap_or_default()
}

fn opt(value: Option<&str>) -> String {
    value.unwrap_or_default().to_string()
}

fn actor_name(actor: Option<&ActorRef>) -> String {
    actor.map(|a| a.nombre.clone()).unwrap_or_default()
}

fn actor_doc(actor: Option<&ActorRef>) -> String {
    actor
        .and_then(|a| a.documento.clone())
        .unwrap_or_default()
}

fn record(row: &HistorialRow) -> [String; 18] {
    [
        row.regulador_id.clone(),
        row.placa.clone(),
        opt(row.contenedor.as_deref()),
        opt(row.muelle.as_deref()),
        row.estado.as_str().to_string(),
        opt(row.fase1_id.as_deref()),
        opt(row.fase2_id.as_deref()),
        fmt_date(row.fecha_entrada),
        fmt_date(row.fecha_salida),
        fmt_date(row.ultima_fecha_cierre),
        row.tiempo_estadia_min
            .map(|m| m.to_string())
            .unwrap_or_default(),
        opt(row.tiempo_estadia_humano.as_deref()),
        opt(row.cuestionario_fase1.as_deref()),
        opt(row.cuestionario_fase2.as_deref()),
        actor_name(row.proveedor.as_ref()),
        actor_doc(row.proveedor.as_ref()),
        actor_name(row.transportista.as_ref()),
        actor_doc(row.transportista.as_ref()),
    ]
}

fn push_line<I, S>(out: &mut String, fields: I)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let line = fields
        .into_iter()
        .map(|f| escape_field(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",");
    out.push_str(&line);
    out.push_str(LINE_END);
}

/// Render rows as CSV text (no BOM)
///
/// Rows sharing an identity key are written once.
pub fn to_csv(rows: &[HistorialRow]) -> String {
    let rows = dedupe_rows(rows.to_vec());
    let mut out = String::new();

    push_line(&mut out, CSV_HEADER);
    for row in &rows {
        push_line(&mut out, record(row));
    }

    out
}

/// Suggested download name for an export made at `now`
pub fn export_filename(now: DateTime<Utc>) -> String {
    format!("historial_reguladores_{}.csv", now.format("%Y%m%d_%H%M"))
}

/// Build the downloadable export
pub fn export_csv(rows: &[HistorialRow], now: DateTime<Utc>) -> CsvExport {
    let text = to_csv(rows);
    let mut bytes = Vec::with_capacity(UTF8_BOM.len() + text.len());
    bytes.extend_from_slice(UTF8_BOM);
    bytes.extend_from_slice(text.as_bytes());

    CsvExport {
        filename: export_filename(now),
        bytes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Estado;
    use chrono::TimeZone;

    fn row() -> HistorialRow {
        HistorialRow {
            regulador_id: "R1".into(),
            placa: "GBO-0921".into(),
            contenedor: Some("MSCU1234567".into()),
            muelle: None,
            estado: Estado::Completo,
            fase1_id: Some("A".into()),
            fase2_id: Some("B".into()),
            fecha_entrada: Some(Utc.with_ymd_and_hms(2024, 7, 1, 10, 0, 0).unwrap()),
            fecha_salida: Some(Utc.with_ymd_and_hms(2024, 7, 2, 13, 5, 0).unwrap()),
            ultima_fecha_cierre: Some(Utc.with_ymd_and_hms(2024, 7, 2, 13, 5, 0).unwrap()),
            tiempo_estadia_min: Some(1625),
            tiempo_estadia_humano: Some("1d 3h 5m".into()),
            proveedor: Some(ActorRef {
                id: "p1".into(),
                nombre: "Frutas del Sur, S.A.".into(),
                documento: Some("0991234567001".into()),
            }),
            transportista: None,
            cuestionario_fase1: Some("Ingreso".into()),
            cuestionario_fase2: Some("Salida".into()),
        }
    }

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("He said \"hi\", bye"), "\"He said \"\"hi\"\", bye\"");
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("two\nlines"), "\"two\nlines\"");
        assert_eq!(escape_field("cr\rhere"), "\"cr\rhere\"");
        assert_eq!(escape_field(""), "");
    }

    #[test]
    fn test_header_line() {
        let csv = to_csv(&[]);
        assert_eq!(
            csv,
            "Regulador ID,Placa,Contenedor,Muelle,Estado,Fase 1 ID,Fase 2 ID,\
             Fecha entrada,Fecha salida,Última fecha cierre,Tiempo estadía (min),\
             Tiempo estadía (humano),Cuestionario Fase 1,Cuestionario Fase 2,\
             Proveedor,Doc. Proveedor,Transportista,Doc. Transportista\r\n"
        );
    }

    #[test]
    fn test_row_rendering() {
        let csv = to_csv(&[row()]);
        let lines: Vec<&str> = csv.split("\r\n").collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], "");
        assert_eq!(
            lines[1],
            "R1,GBO-0921,MSCU1234567,,completo,A,B,2024-07-01 10:00:00,\
             2024-07-02 13:05:00,2024-07-02 13:05:00,1625,1d 3h 5m,Ingreso,Salida,\
             \"Frutas del Sur, S.A.\",0991234567001,,"
        );
    }

    #[test]
    fn test_duplicates_written_once() {
        let csv = to_csv(&[row(), row()]);
        assert_eq!(csv.matches("\r\n").count(), 2);
    }

    #[test]
    fn test_export_blob() {
        let now = Utc.with_ymd_and_hms(2024, 7, 3, 9, 7, 45).unwrap();
        let export = export_csv(&[row()], now);

        assert_eq!(export.filename, "historial_reguladores_20240703_0907.csv");
        assert!(export.bytes.starts_with(UTF8_BOM));
        let text = std::str::from_utf8(&export.bytes[UTF8_BOM.len()..]).unwrap();
        assert!(text.starts_with("Regulador ID,"));
    }
}
