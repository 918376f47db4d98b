use crate::cli::config::Command;
use anyhow::{Context, bail};
use ferrodoc::{Database, WriteBatch, ferrodoc_core::path::DocumentPath};
use futures::{StreamExt, TryStreamExt};
use serde_json::{Map, Value, json};

pub async fn run(db: &Database, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Get { paths } => get(db, &paths).await,
        Command::Query {
            structured_query,
            parent,
        } => query(db, &structured_query, parent.as_deref()).await,
        Command::Commit { writes } => commit(db, &writes).await,
        Command::Listen { paths } => listen(db, &paths).await,
    }
}

async fn get(db: &Database, paths: &[String]) -> anyhow::Result<()> {
    let paths = parse_paths(paths)?;
    let snapshots = db.get_all(&paths).await?;
    println!("{}", serde_json::to_string_pretty(&snapshots)?);
    Ok(())
}

async fn query(db: &Database, structured_query: &str, parent: Option<&str>) -> anyhow::Result<()> {
    let structured_query: Value =
        serde_json::from_str(structured_query).context("structured query is not valid JSON")?;
    let parent = parent.map(DocumentPath::parse).transpose()?;

    let mut documents = db.run_query(parent.as_ref(), structured_query).await?;
    let mut count = 0usize;
    while let Some(snapshot) = documents.try_next().await? {
        println!("{}", serde_json::to_string(&snapshot)?);
        count += 1;
    }
    tracing::info!("Query returned {count} document(s)");
    Ok(())
}

async fn commit(db: &Database, writes: &str) -> anyhow::Result<()> {
    let writes: Value = serde_json::from_str(writes).context("writes are not valid JSON")?;
    let Value::Array(writes) = writes else {
        bail!("writes must be a JSON list");
    };

    let mut batch = db.batch();
    for write in &writes {
        apply_write(&mut batch, write)?;
    }
    let response = batch.commit().await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn listen(db: &Database, paths: &[String]) -> anyhow::Result<()> {
    let root = db.database_root().await?;
    let documents: Vec<String> = parse_paths(paths)?
        .iter()
        .map(|path| path.formatted_name(&root))
        .collect();
    let count = documents.len();

    let mut changes = db
        .listen(json!({
            "documents": {"documents": documents},
            "targetId": 1,
        }))
        .await?;
    tracing::info!("Listening to {count} document(s), press Ctrl+C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C signal");
                break;
            }
            next = changes.next() => match next {
                Some(change) => println!("{}", serde_json::to_string(&change?)?),
                None => {
                    tracing::info!("Listen stream closed by the server");
                    break;
                }
            },
        }
    }
    Ok(())
}

fn parse_paths(raw: &[String]) -> anyhow::Result<Vec<DocumentPath>> {
    raw.iter()
        .map(|path| {
            DocumentPath::parse(path).with_context(|| format!("invalid document path {path:?}"))
        })
        .collect()
}

/// Adds one `{"op", "path", "fields"}` entry to `batch`.
fn apply_write(batch: &mut WriteBatch, write: &Value) -> anyhow::Result<()> {
    let op = write
        .get("op")
        .and_then(Value::as_str)
        .context("write is missing \"op\"")?;
    let path = write
        .get("path")
        .and_then(Value::as_str)
        .context("write is missing \"path\"")?;
    let path = DocumentPath::parse(path)?;
    let fields = match write.get("fields") {
        None => Map::new(),
        Some(Value::Object(fields)) => fields.clone(),
        Some(other) => bail!("fields of {path} must be an object, got {other}"),
    };

    match op {
        "create" => batch.create(&path, fields),
        "set" => batch.set(&path, fields),
        "update" => batch.update(&path, fields),
        "delete" => batch.delete(&path),
        other => bail!("unknown write op {other:?}"),
    };
    Ok(())
}
