use std::io::{self, Write};

use serde::Serialize;

use crate::app::QueryReport;
use crate::summary::Summary;

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_query(report: &QueryReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_summary(summary: &Summary) -> io::Result<()> {
        #[derive(Serialize)]
        struct Row<'a> {
            tic: u64,
            toi: String,
            harps_name: Option<&'a str>,
            nspectra: usize,
            tess_mag: Option<f64>,
        }
        let rows: Vec<Row<'_>> = summary
            .rows()
            .iter()
            .map(|row| Row {
                tic: row.tic.value(),
                toi: row.toi.to_string(),
                harps_name: row.harps_name.as_deref(),
                nspectra: row.nspectra,
                tess_mag: row.tess_mag,
            })
            .collect();
        Self::print_json(&rows)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
