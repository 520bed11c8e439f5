mod common;

use std::{sync::Arc, time::Duration};

use common::{Behavior, spawn};
use practitioner_lookup::dispatch::{Dispatcher, HttpTransport};
use practitioner_lookup::response::QueryResponse;
use practitioner_lookup::schema::QueryBatch;
use practitioner_lookup::session::Session;

fn session(base_url: &str, download_dir: &std::path::Path) -> Session {
    let transport = HttpTransport::new(base_url, Duration::from_secs(5), 0).unwrap();
    Session::new(Dispatcher::new(Arc::new(transport)), 10, download_dir)
}

async fn run_script(session: &mut Session, script: &str) -> String {
    let mut out = Vec::new();
    session.run(script.as_bytes(), &mut out).await.unwrap();
    String::from_utf8(out).unwrap()
}

#[tokio::test]
async fn manual_batch_lookup_download_and_clear() {
    colored::control::set_override(false);
    let service = spawn(Behavior::Echo).await;
    let dir = tempfile::tempdir().unwrap();
    let mut session = session(&service.base_url, dir.path());

    let output = run_script(
        &mut session,
        "download\n\
         set 0 first_name John\n\
         set 0 last_name Doe\n\
         set 0 npi 1234567890\n\
         submit\n\
         wait\n\
         download\n\
         clear\n\
         results\n\
         quit\n\
         show\n",
    )
    .await;

    assert!(output.contains("No results to download yet"));
    assert!(output.contains("submitted request #1"));
    assert!(output.contains("Search Results:"));
    assert!(output.contains("[-] 1234567890 (2 rows, page 1/1)"));
    assert!(output.contains("batch cleared"));
    // Nothing after quit runs.
    assert!(!output.contains("mode=manual"));

    let calls = service.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].params["endpoint"], "All");
    assert_eq!(calls[0].params["consensus"], "True");

    assert_eq!(session.batch(), &QueryBatch::default());
    assert!(session.results().table("1234567890").is_some());

    let saved: QueryResponse =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("data.json")).unwrap())
            .unwrap();
    assert_eq!(Some(&saved), session.dispatcher().response());
}

#[tokio::test]
async fn invalid_npi_blocks_submission() {
    let service = spawn(Behavior::Echo).await;
    let dir = tempfile::tempdir().unwrap();
    let mut session = session(&service.base_url, dir.path());

    let output = run_script(
        &mut session,
        "set 0 first_name John\nset 0 last_name Doe\nset 0 npi 12345\nsubmit\n",
    )
    .await;

    assert!(output.contains("Cannot submit:"));
    assert!(output.contains("npi must be exactly 10 characters"));
    assert!(service.calls().is_empty());
}

#[tokio::test]
async fn upload_then_failed_lookup_clears_tables() {
    colored::control::set_override(false);
    let service = spawn(Behavior::NotFound).await;
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("batch.csv");
    std::fs::write(&csv, "first_name,last_name,npi\nJohn,Doe,1234567890\nJane,Roe,0987654321\n")
        .unwrap();
    let mut session = session(&service.base_url, dir.path());

    let script = format!(
        "upload {}\nmode upload\nupload {}\nendpoint kaiser\nconsensus false\nsubmit\nwait\nresults\n",
        csv.display(),
        csv.display()
    );
    let output = run_script(&mut session, &script).await;

    assert!(output.contains("switch to upload mode first"));
    assert!(output.contains("File uploaded: batch.csv"));
    assert!(output.contains("loaded 2 records"));
    assert!(output.contains("Error: HTTP 404: Could not find practitioner"));
    assert!(session.results().tables().is_empty());

    let calls = service.calls();
    assert_eq!(calls[0].params["endpoint"], "Kaiser");
    assert_eq!(calls[0].params["consensus"], "False");
    assert_eq!(calls[0].body["practitioners"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn unknown_commands_do_not_stop_the_session() {
    let service = spawn(Behavior::Echo).await;
    let dir = tempfile::tempdir().unwrap();
    let mut session = session(&service.base_url, dir.path());

    let output = run_script(&mut session, "frobnicate\nremove 3\nadd\nshow\n").await;

    assert!(output.contains("unknown command"));
    assert!(output.contains("no record [3]"));
    assert!(output.contains("records=2"));
}

#[tokio::test]
async fn single_lookup_from_the_session() {
    colored::control::set_override(false);
    let service = spawn(Behavior::Echo).await;
    let dir = tempfile::tempdir().unwrap();
    let mut session = session(&service.base_url, dir.path());

    let output = run_script(
        &mut session,
        "endpoint Humana\n\
         consensus false\n\
         lookup Jane Roe 5555555555\n\
         wait\n\
         quit\n",
    )
    .await;

    assert!(output.contains("looking up 5555555555 as request #1"));
    assert!(output.contains("[-] 5555555555 (1 rows, page 1/1)"));

    let calls = service.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].params["first_name"], "Jane");
    assert_eq!(calls[0].params["endpoint"], "Humana");
    assert_eq!(calls[0].params["consensus"], "False");
    assert_eq!(session.batch(), &QueryBatch {
        endpoint: practitioner_lookup::schema::EndpointSelector::Humana,
        consensus: false,
        ..QueryBatch::default()
    });
}
