const BIND_ADDR: &str = "0.0.0.0:8080";

#[tokio::main]
async fn main() {
    storefront_observability::init();

    let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
        tracing::warn!("JWT_SECRET unset, falling back to the dev-only secret");
        "dev-secret".to_string()
    });

    let app = storefront_api::app::build_app(jwt_secret).await;

    let listener = tokio::net::TcpListener::bind(BIND_ADDR)
        .await
        .expect("bind 0.0.0.0:8080");

    tracing::info!(addr = BIND_ADDR, "storefront api listening");

    axum::serve(listener, app).await.unwrap();
}
