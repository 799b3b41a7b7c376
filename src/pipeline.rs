use tracing::{info, warn};

use crate::error::{EtlError, Result};
use crate::fetcher::Source;
use crate::loader::Sink;
use crate::transform::{self, ParseOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub fetched_bytes: usize,
    pub records: usize,
    pub skipped: usize,
    pub inserted: u64,
}

/// Fetch and parse without touching the database.
pub async fn preview<S: Source + ?Sized>(source: &S) -> Result<ParseOutcome> {
    let body = fetch(source).await?;
    parse(&body)
}

/// Fetch, transform, then replace the target table. A non-200 fetch stops
/// the run before any parsing or database work.
pub async fn run<S, K>(source: &S, sink: &mut K) -> Result<RunSummary>
where
    S: Source + ?Sized,
    K: Sink + ?Sized,
{
    let body = fetch(source).await?;
    let outcome = parse(&body)?;

    println!("Uploading data to Postgres...");
    let inserted = sink.load(&outcome.records).await?;
    println!("Data successfully loaded into PostgreSQL ({} rows)", inserted);

    Ok(RunSummary {
        fetched_bytes: body.len(),
        records: outcome.records.len(),
        skipped: outcome.skipped,
        inserted,
    })
}

async fn fetch<S: Source + ?Sized>(source: &S) -> Result<String> {
    println!("Fetching data from KoboToolbox...");
    let response = source.fetch().await?;
    if !response.is_ok() {
        warn!(status = response.status, "Export request rejected");
        return Err(EtlError::Fetch {
            status: response.status,
        });
    }
    println!(
        "Data was fetched successfully. Status code: {}",
        response.status
    );
    Ok(response.body)
}

fn parse(body: &str) -> Result<ParseOutcome> {
    println!("Processing data...");
    let outcome = transform::parse_export(body)?;
    println!(
        "Parsed {} records ({} malformed rows skipped)",
        outcome.records.len(),
        outcome.skipped
    );
    if outcome.skipped > 0 {
        info!(skipped = outcome.skipped, "Some rows were dropped, see warnings above");
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::FetchResponse;
    use crate::record::Record;
    use async_trait::async_trait;

    const SCENARIO: &str = "start;end;Enter a date;Country;Event;Oblast;Casualties;Injured;Captured;Civilian Casualties;New Recruits;Combat Intensity;Territory Status;Percentage Occupied;Area Occupied\n2024-01-01;2024-01-02;2024-01-01;Ukraine;Skirmish;Kharkiv;3;2;1;0;5;7.5;Contested;40.0;12.3";

    struct FakeSource {
        status: u16,
        body: &'static str,
    }

    #[async_trait]
    impl Source for FakeSource {
        async fn fetch(&self) -> Result<FetchResponse> {
            Ok(FetchResponse {
                status: self.status,
                body: self.body.to_string(),
            })
        }
    }

    /// In-memory table with the same replace-everything semantics.
    #[derive(Default)]
    struct MemorySink {
        loads: usize,
        rows: Vec<Record>,
    }

    #[async_trait]
    impl Sink for MemorySink {
        async fn load(&mut self, records: &[Record]) -> Result<u64> {
            self.loads += 1;
            self.rows = records.to_vec();
            Ok(records.len() as u64)
        }
    }

    #[tokio::test]
    async fn scenario_loads_one_row_with_total() {
        let source = FakeSource {
            status: 200,
            body: SCENARIO,
        };
        let mut sink = MemorySink::default();

        let summary = run(&source, &mut sink).await.unwrap();
        assert_eq!(summary.records, 1);
        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.skipped, 0);
        assert_eq!(summary.fetched_bytes, SCENARIO.len());
        assert_eq!(sink.rows.len(), 1);
        assert_eq!(sink.rows[0].total_soldiers_casualties, 6);
    }

    #[tokio::test]
    async fn forbidden_fetch_never_reaches_the_sink() {
        let source = FakeSource {
            status: 403,
            body: SCENARIO,
        };
        let mut sink = MemorySink::default();

        let err = run(&source, &mut sink).await.unwrap_err();
        assert!(matches!(err, EtlError::Fetch { status: 403 }));
        assert!(err.to_string().contains("403"));
        assert_eq!(sink.loads, 0);
    }

    #[tokio::test]
    async fn structural_parse_failure_never_reaches_the_sink() {
        let source = FakeSource {
            status: 200,
            body: "<html>login required</html>",
        };
        let mut sink = MemorySink::default();

        let err = run(&source, &mut sink).await.unwrap_err();
        assert!(matches!(err, EtlError::MissingColumns(_)));
        assert_eq!(sink.loads, 0);
    }

    #[tokio::test]
    async fn running_twice_replaces_instead_of_appending() {
        let source = FakeSource {
            status: 200,
            body: SCENARIO,
        };
        let mut sink = MemorySink::default();

        let first = run(&source, &mut sink).await.unwrap();
        let after_first = sink.rows.clone();
        let second = run(&source, &mut sink).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(sink.loads, 2);
        assert_eq!(sink.rows, after_first);
    }

    #[tokio::test]
    async fn preview_reports_skipped_rows() {
        let body = "start;end;Enter a date;Country;Event;Oblast;Casualties;Injured;Captured;Civilian Casualties;New Recruits;Combat Intensity;Territory Status;Percentage Occupied;Area Occupied\n\
                    ;;;;;Kyiv;1;1;1;;;;;;\n\
                    ;;;;;Odesa;x;1;1;;;;;;\n";
        let source = FakeSource { status: 200, body };
        let outcome = preview(&source).await.unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.skipped, 1);
    }
}
