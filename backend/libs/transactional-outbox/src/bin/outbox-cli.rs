use std::env;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use transactional_outbox::{OutboxRepository, SqlxOutboxRepository};
use uuid::Uuid;

fn usage() -> ! {
    eprintln!("Usage:");
    eprintln!("  outbox-cli stats <DATABASE_URL>");
    eprintln!("  outbox-cli replay-since <rfc3339_ts> <DATABASE_URL>");
    eprintln!("  outbox-cli replay-event <event_uuid> <DATABASE_URL>");
    eprintln!("  outbox-cli replay-parked <max_retries> <DATABASE_URL>");
    std::process::exit(1);
}

async fn repository(db_url: &str) -> anyhow::Result<SqlxOutboxRepository> {
    let pool = PgPool::connect(db_url).await?;
    Ok(SqlxOutboxRepository::new(pool))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        usage();
    }

    match args[1].as_str() {
        "stats" if args.len() == 3 => {
            let repo = repository(&args[2]).await?;
            let (pending, age) = repo.pending_stats().await?;
            println!("{} pending, oldest {}s", pending, age);
        }
        "replay-since" if args.len() == 4 => {
            let ts: DateTime<Utc> = DateTime::parse_from_rfc3339(&args[2])?.with_timezone(&Utc);
            let repo = repository(&args[3]).await?;
            let count = repo.replay_since(ts).await?;
            println!("Replayed {} records since {}", count, ts);
        }
        "replay-event" if args.len() == 4 => {
            let event_id = Uuid::parse_str(&args[2])?;
            let repo = repository(&args[3]).await?;
            let count = repo.replay_event(event_id).await?;
            println!("Replayed {} records of event {}", count, event_id);
        }
        "replay-parked" if args.len() == 4 => {
            let max_retries: i32 = args[2].parse()?;
            let repo = repository(&args[3]).await?;
            let count = repo.replay_parked(max_retries).await?;
            println!("Re-queued {} parked records", count);
        }
        _ => usage(),
    }

    Ok(())
}
