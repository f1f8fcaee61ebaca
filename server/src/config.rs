use chrono::NaiveTime;
use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "almacen-server", about = "Inventory and order management backend")]
pub struct Config {
    /// HTTP port to listen on.
    #[arg(long, env = "PORT", default_value_t = 4000)]
    pub port: u16,

    /// Postgres connection URL. Without one, documents live in memory.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Maximum pooled Postgres connections.
    #[arg(long, env = "POOL_SIZE", default_value_t = 8)]
    pub pool_size: usize,

    /// Daily time (UTC, HH:MM) at which overdue orders are swept.
    #[arg(long, env = "SWEEP_AT", default_value = "00:05", value_parser = parse_time_of_day)]
    pub sweep_at: NaiveTime,

    /// Do not schedule the overdue-order sweep.
    #[arg(long)]
    pub no_sweep: bool,
}

fn parse_time_of_day(raw: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(raw, "%H:%M").map_err(|e| format!("expected HH:MM, got '{raw}': {e}"))
}
