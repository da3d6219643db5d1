use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::Result;
use confman_app::{BootstrapDependencies, serve};
use confman_config::ManagedRoot;
use confman_fsops::{EnvSubstituter, Mutator};
use confman_telemetry::LoggingConfig;
use confman_test_support::fixtures::ManagedTree;
use confman_test_support::payloads::{http_input, process_input};
use serde_json::{Value, json};
use tokio::io::AsyncReadExt;

async fn serve_lines(tree: &ManagedTree, lines: &[Value]) -> Result<Vec<Value>> {
    let mutator = Mutator::with_substituter(
        tree.settings(),
        EnvSubstituter::with_lookup(|name| (name == "TICK").then(|| "20".to_string()))?,
    );
    let dependencies =
        BootstrapDependencies::with_parts(LoggingConfig::default(), tree.settings().clone(), mutator)?;

    let mut input = String::new();
    for line in lines {
        input.push_str(&line.to_string());
        input.push('\n');
    }
    let (writer, mut reader) = tokio::io::duplex(256 * 1024);
    serve(dependencies, input.as_bytes(), writer).await?;

    let mut output = String::new();
    reader.read_to_string(&mut output).await?;
    Ok(output
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?)
}

#[tokio::test]
async fn records_use_host_field_names() -> Result<()> {
    let tree = ManagedTree::new()?;
    let records = serve_lines(
        &tree,
        &[
            json!({"action": "add", "payload": process_input("load", Some(30)), "cursor": "1"}),
            json!({"action": "return", "cursor": "2"}),
        ],
    )
    .await?;

    assert_eq!(records.len(), 2);
    let added = &records[0];
    assert_eq!(added["Status"], "OK");
    assert_eq!(added["ConfType"], "ProcessInput");
    assert_eq!(added["ConfCategory"], "Input");
    assert_eq!(added["Ticker"], "30");
    assert_eq!(added["CMTag"], "CM");
    assert!(added["Uuid"].is_string());

    let listed = &records[1];
    assert_eq!(listed["ConfName"], "load");
    assert_eq!(listed["FileName"], added["FileName"]);
    assert_eq!(listed["Payload"], process_input("load", Some(30)));
    Ok(())
}

#[tokio::test]
async fn listed_payload_keeps_unsubstituted_text() -> Result<()> {
    let tree = ManagedTree::new()?;
    let payload = "[tick]\ntype = \"ProcessInput\"\nticker_interval = 20\nnote = \"%ENV[TICK]\"\n";
    let records = serve_lines(
        &tree,
        &[
            json!({"action": "add", "payload": payload, "cursor": "1"}),
            json!({"action": "return", "cursor": "2"}),
        ],
    )
    .await?;

    assert_eq!(records.len(), 2);
    assert_eq!(records[1]["Payload"], payload);
    assert_eq!(records[1]["Ticker"], "20");
    Ok(())
}

#[tokio::test]
async fn request_fields_are_read_from_json() -> Result<()> {
    let tree = ManagedTree::new()?;
    let records = serve_lines(
        &tree,
        &[
            json!({"action": "add", "payload": process_input("a", None), "cursor": "1"}),
            json!({"action": "add", "payload": process_input("a", None), "cursor": "2",
                   "fields": {"Overwrite": "bogus"}}),
            json!({"action": "delete", "cursor": "3", "fields": {"Filename": 7}}),
        ],
    )
    .await?;

    let statuses: Vec<&str> = records
        .iter()
        .filter_map(|record| record["Status"].as_str())
        .collect();
    assert_eq!(statuses, ["OK", "ERROR", "ERROR"]);
    assert_eq!(
        records[1]["Payload"],
        "Invalid 'Overwrite' Field: not_a_bool (bogus)"
    );
    assert_eq!(
        records[2]["Payload"],
        "Invalid 'Filename' Field: wrong_type (integer)"
    );
    Ok(())
}

#[tokio::test]
async fn slow_reader_receives_every_listed_record() -> Result<()> {
    const FILES: usize = 1_500;
    let tree = ManagedTree::new()?;
    for index in 0..FILES {
        let name = format!("site{index:04}");
        tree.write(
            ManagedRoot::Http,
            &format!("{name}.toml"),
            &http_input(&name, "http://localhost"),
        )?;
    }
    let mutator =
        Mutator::with_substituter(tree.settings(), EnvSubstituter::with_lookup(|_| None)?);
    let dependencies =
        BootstrapDependencies::with_parts(LoggingConfig::default(), tree.settings().clone(), mutator)?;

    let (writer, mut reader) = tokio::io::duplex(1024);
    let consumer = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        let mut output = String::new();
        reader.read_to_string(&mut output).await.map(|_| output)
    });

    let input = format!("{}\n", json!({"action": "return", "cursor": "1"}));
    serve(dependencies, input.as_bytes(), writer).await?;
    let output = consumer.await??;

    let records: Vec<Value> = output
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?;
    assert_eq!(records.len(), FILES);
    let names: BTreeSet<&str> = records
        .iter()
        .filter_map(|record| record["ConfName"].as_str())
        .collect();
    assert_eq!(names.len(), FILES);
    assert!(records.iter().all(|record| record["Status"] == "OK"));
    Ok(())
}
