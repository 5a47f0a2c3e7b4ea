use std::sync::Arc;

use actix::Actor;
use actix_cors::Cors;
use actix_web::{get, web, App, HttpResponse, HttpServer, Responder};
use tracing::info;

use tutor_api::actors::meeting_server::MeetingServer;
use tutor_api::config::Config;
use tutor_api::lobby;
use tutor_api::metrics;
use tutor_api::models::AppState;

#[get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().body("ok")
}

#[get("/metrics")]
async fn metrics_endpoint() -> HttpResponse {
    match metrics::render() {
        Ok(buffer) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(buffer),
        Err(e) => HttpResponse::InternalServerError().body(e.to_string()),
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    let listen_addr = config.listen_addr.clone();
    info!("starting signaling server on {listen_addr}");

    let server = MeetingServer::new(config.clone()).start();
    let state = AppState {
        server,
        config: Arc::new(config),
    };

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(cors)
            .service(lobby::ws_connect)
            .service(health)
            .service(metrics_endpoint)
    })
    .bind(listen_addr)?
    .run()
    .await
}
