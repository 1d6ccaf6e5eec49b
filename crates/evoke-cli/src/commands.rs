//! Subcommand definitions.

use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the SSE server and HTTP API
    Serve {
        /// Port to listen on
        #[arg(short, long, env = "EVOKE_PORT", default_value = "3000")]
        port: u16,
        /// Minimum interval between throttled progress snapshots, in milliseconds
        #[arg(long, env = "EVOKE_THROTTLE_MS", default_value = "200")]
        throttle_ms: u64,
        /// Interval between keep-alive comments, in seconds
        #[arg(long, env = "EVOKE_HEARTBEAT_SECS", default_value = "30")]
        heartbeat_secs: u64,
        /// Allowed CORS origin (repeatable); all origins when omitted
        #[arg(long = "cors-origin")]
        cors_origins: Vec<String>,
    },

    /// Follow a project's event stream and print progress
    Watch {
        /// Project to watch
        project_id: String,
        /// Base URL of the evoke server
        #[arg(long, env = "EVOKE_SERVER_URL", default_value = "http://localhost:3000")]
        url: String,
        /// Reconnect attempts before giving up
        #[arg(long, default_value = "5")]
        max_attempts: u32,
    },
}
