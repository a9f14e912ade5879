use std::{sync::Arc, time::Duration};

use rqlite_http::{
    CancellationToken, ConsistencyLevel, PooledSelector, QueryOptions, RqliteClient, RqliteError,
    Statement, Url,
};

async fn is_ready(url: Url) -> bool {
    let Ok(readyz) = url.join("readyz") else {
        return false;
    };
    match reqwest::get(readyz).await {
        Ok(response) => response.status().is_success(),
        Err(_) => false,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let nodes = std::env::var("RQLITE_HTTP_NODES")
        .unwrap_or_else(|_| "http://localhost:4001,http://localhost:4003".to_owned());

    let selector = Arc::new(PooledSelector::new(
        nodes.split(',').map(str::trim),
        is_ready,
        Duration::from_secs(5),
    )?);
    let db = RqliteClient::with_selector(selector.clone())?;
    let cancel = CancellationToken::new();

    for url in selector.healthy() {
        if !is_ready(url.clone()).await {
            eprintln!("{url} is not ready; taking it out of rotation");
            selector.mark_bad(&url);
        }
    }

    let options = QueryOptions {
        level: ConsistencyLevel::Weak,
        ..QueryOptions::default()
    };
    for _ in 0..5 {
        match db
            .query(&cancel, &[Statement::new("SELECT 1", ())], Some(&options))
            .await
        {
            Ok(response) => println!("{:?}", response.results),
            Err(RqliteError::NoEndpointsAvailable) => {
                eprintln!("no node is ready");
                break;
            }
            Err(err) => return Err(err.into()),
        }
    }

    println!("healthy: {:?}", selector.healthy());
    println!("bad: {:?}", selector.bad());
    selector.close().await;
    Ok(())
}
