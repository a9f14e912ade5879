use rqlite_http::{CancellationToken, Params, RqliteClient, Value};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let db = RqliteClient::from_env().map_err(anyhow::Error::msg)?;
    let cancel = CancellationToken::new();

    db.execute_single(
        &cancel,
        "CREATE TABLE IF NOT EXISTS users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
        (),
    )
    .await?;

    db.execute_single(
        &cancel,
        "INSERT INTO users (name) VALUES (?)",
        [Value::text("fiona")],
    )
    .await?;

    let response = db
        .query_single(
            &cancel,
            "SELECT id, name FROM users WHERE name = :name",
            Params::named([("name", Value::text("fiona"))]),
        )
        .await?;

    if let Some(results) = response.results.columnar() {
        for row in results.iter().flat_map(|result| &result.values) {
            println!("{row:?}");
        }
    }

    println!("node version: {}", db.version(&cancel).await?);
    Ok(())
}
