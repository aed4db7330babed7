#[tokio::main]
async fn main() -> anyhow::Result<()> {
    apothek_observability::init();

    let addr = std::env::var("APOTHEK_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    let app = apothek_api::app::build_app();

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
