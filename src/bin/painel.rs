use anyhow::Result;
use chrono::Local;

use jornada_academica::models::review_kind_label;
use jornada_academica::sync::{SyncClient, REFRESH_INTERVAL};
use jornada_academica::views::{self, MonthRef};

/// Console dashboard over the HTTP API, with the local cache as the offline
/// fallback. `--watch` keeps refreshing on the sync interval.
#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let base_url =
        std::env::var("API_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
    let cache_path =
        std::env::var("CACHE_FILE").unwrap_or_else(|_| "jornada_cache.json".to_string());
    let watch = std::env::args().any(|arg| arg == "--watch");

    let mut client = SyncClient::new(&base_url, cache_path);

    if watch {
        let mut ticker = tokio::time::interval(REFRESH_INTERVAL);
        loop {
            ticker.tick().await;
            client.refresh().await;
            render(&client);
        }
    }

    client.refresh().await;
    render(&client);
    Ok(())
}

fn render(client: &SyncClient) {
    let today = Local::now().date_naive();
    let month = MonthRef::containing(today);
    let counters = views::dashboard_counters(client.items(), month, today);

    println!("Jornada Acadêmica {:02}/{}", month.mes, month.ano);
    if !client.is_online() {
        println!("(offline: dados do cache local)");
    }
    println!();
    println!("  pendentes:          {}", counters.pendentes);
    println!("  em atraso:          {}", counters.atrasos);
    println!("  concluídos:         {}", counters.concluidos);
    println!("  revisões pendentes: {}", counters.revisoes_pendentes);

    let pending = views::pending_reviews(client.items(), today);
    if !pending.is_empty() {
        println!();
        println!("Revisões a fazer:");
        for entry in pending {
            println!(
                "  {}  {} - {} ({})",
                entry.revisao.data,
                entry.curso,
                entry.conteudo,
                review_kind_label(&entry.revisao.tipo)
            );
        }
    }
    println!();
}
