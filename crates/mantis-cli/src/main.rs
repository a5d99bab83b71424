use clap::{Parser, Subcommand};

mod config;
mod dgst;
mod identity;
mod logger;
mod rand_cmd;
mod s_client;
mod s_server;
mod speed;

/// mantis command-line tool: digests, random bytes, benchmarks and a TLS test client/server.
#[derive(Parser)]
#[command(name = "mantis")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Hash/digest a file.
    Dgst {
        /// Hash algorithm (md5, sha1, sha224, sha256, sha384, sha512, sha3-224, sha3-256, sha3-384, sha3-512).
        #[arg(short, long, default_value = "sha256")]
        algorithm: String,
        /// Input file (use - for stdin).
        file: String,
    },
    /// Print random bytes from the DRBG as hex.
    Rand {
        /// Number of bytes.
        num: usize,
    },
    /// Throughput benchmark for hashes, AEADs and signatures.
    Speed {
        /// Algorithm name or "all".
        #[arg(short, long, default_value = "all")]
        algorithm: String,
        /// Seconds per algorithm.
        #[arg(short, long, default_value = "1")]
        seconds: u64,
    },
    /// TLS echo server with a freshly generated self-signed identity.
    #[command(name = "s_server")]
    SServer {
        /// Port to listen on.
        #[arg(short, long, default_value = "4433")]
        port: u16,
        /// Identity key type (ed25519, p256, p384, rsa).
        #[arg(long, default_value = "p256")]
        key_type: String,
        /// Write the generated certificate (DER) here for clients to trust.
        #[arg(long)]
        cert_out: Option<String>,
        /// Keep a session cache so clients can resume.
        #[arg(long)]
        cache: bool,
        /// JSON settings file (versions, suites, groups, cache).
        #[arg(long)]
        config: Option<String>,
        /// Serve this many connections, then exit.
        #[arg(long)]
        count: Option<usize>,
    },
    /// TLS test client.
    #[command(name = "s_client")]
    SClient {
        /// Server host name.
        #[arg(long, default_value = "localhost")]
        host: String,
        /// Server port.
        #[arg(short, long, default_value = "4433")]
        port: u16,
        /// Trusted root certificate (DER). Without it the peer is not verified.
        #[arg(long)]
        ca: Option<String>,
        /// Reconnect once and resume the first session.
        #[arg(long)]
        resume: bool,
        /// Send a TLS 1.3 KeyUpdate before the message.
        #[arg(long)]
        key_update: bool,
        /// Message to send; the echoed reply is printed.
        #[arg(short, long, default_value = "hello from mantis")]
        message: String,
        /// JSON settings file (versions, suites, groups, ALPN).
        #[arg(long)]
        config: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    logger::init(cli.verbose);

    let result = match &cli.command {
        Commands::Dgst { algorithm, file } => dgst::run(algorithm, file),
        Commands::Rand { num } => rand_cmd::run(*num),
        Commands::Speed { algorithm, seconds } => speed::run(algorithm, *seconds),
        Commands::SServer {
            port,
            key_type,
            cert_out,
            cache,
            config,
            count,
        } => s_server::run(&s_server::ServerOptions {
            port: *port,
            key_type: key_type.clone(),
            cert_out: cert_out.clone(),
            cache: *cache,
            config: config.clone(),
            count: *count,
        }),
        Commands::SClient {
            host,
            port,
            ca,
            resume,
            key_update,
            message,
            config,
        } => s_client::run(&s_client::ClientOptions {
            host: host.clone(),
            port: *port,
            ca: ca.clone(),
            resume: *resume,
            key_update: *key_update,
            message: message.clone(),
            config: config.clone(),
        }),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
