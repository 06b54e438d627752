use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use voicebill::billing::bill_file_name;
use voicebill::capture::{MicrophoneCapture, calculate_energy};
use voicebill::dashboard::DashboardSnapshot;
use voicebill::feedback::{AudioRenderer, SilentRenderer};
use voicebill::voice::{AudioPlayback, AudioRecorder, SpeakerRenderer, SpeechToText, TextToSpeech};
use voicebill::{
    ActionType, BillingClient, Config, DashboardClient, Dispatcher, Error, HttpInterpreter,
    SessionController, SubmitOutcome, TransactionId,
};

/// voicebill - Voice-driven billing counter
#[derive(Parser)]
#[command(name = "voicebill", version, about)]
struct Cli {
    /// Billing server URL (overrides config)
    #[arg(short, long, env = "VOICEBILL_SERVER_URL")]
    server: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print replies instead of playing audio
    #[arg(long)]
    no_audio: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Send one typed command and print the reply
    Send {
        /// Command text, e.g. "add two Maggi"
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Download the bill for a transaction
    Bill {
        /// Transaction id
        id: String,
        /// Directory to save into (defaults to the data dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show dashboard statistics
    Dashboard,
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,voicebill=info",
        1 => "info,voicebill=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(server) = cli.server {
        config.server.url = server;
    }
    tracing::debug!(?config, "loaded configuration");

    match cli.command {
        Some(Command::Send { text }) => send(&config, cli.no_audio, &text.join(" ")).await,
        Some(Command::Bill { id, output }) => {
            let dir = output.unwrap_or_else(|| config.data_dir.clone());
            let billing = BillingClient::new(&config.server.url, config.server.request_timeout);
            let path = billing.save(&TransactionId::new(id), &dir).await?;
            println!("Saved {}", path.display());
            Ok(())
        }
        Some(Command::Dashboard) => {
            let client = DashboardClient::new(&config.server.url, config.server.request_timeout);
            print_dashboard(&client.refresh().await);
            Ok(())
        }
        Some(Command::TestMic { duration }) => test_mic(duration).await,
        None => repl(&config, cli.no_audio).await,
    }
}

/// Wire a session controller from configuration
fn build_session(config: &Config, no_audio: bool) -> SessionController {
    let timeout = config.server.request_timeout;
    let interpreter = HttpInterpreter::new(&config.server.url, timeout);
    let dispatcher = Dispatcher::with_timeout(Arc::new(interpreter), timeout);

    let mut session = SessionController::new(dispatcher, build_renderer(config, no_audio))
        .with_billing(BillingClient::new(&config.server.url, timeout));

    if config.server.dashboard_refresh {
        session = session.with_dashboard(DashboardClient::new(&config.server.url, timeout));
    }

    if config.voice.enabled {
        match build_stt(config) {
            Some(Ok(stt)) => {
                let capture = MicrophoneCapture::new(stt, config.voice.capture_limits());
                session = session.with_capture(Arc::new(capture));
            }
            Some(Err(e)) => tracing::warn!(error = %e, "speech capture disabled"),
            None => tracing::info!(
                provider = ?config.voice.stt_provider,
                "no STT key configured, voice input disabled"
            ),
        }
    }

    session
}

fn build_renderer(config: &Config, no_audio: bool) -> Arc<dyn AudioRenderer> {
    if no_audio || !config.voice.enabled {
        return Arc::new(SilentRenderer);
    }

    let playback = match AudioPlayback::new() {
        Ok(playback) => playback,
        Err(e) => {
            tracing::warn!(error = %e, "no audio output, replies will be printed only");
            return Arc::new(SilentRenderer);
        }
    };

    let tts = config.api_keys.openai.clone().and_then(|key| {
        TextToSpeech::new(
            key,
            config.voice.tts_model.clone(),
            config.voice.tts_voice.clone(),
            config.voice.tts_speed,
        )
        .map_err(|e| tracing::warn!(error = %e, "speech synthesis disabled"))
        .ok()
    });

    Arc::new(SpeakerRenderer::new(playback, tts))
}

fn build_stt(config: &Config) -> Option<voicebill::Result<SpeechToText>> {
    let provider = config.voice.stt_provider;
    let key = config.api_keys.stt_key(provider)?;
    Some(SpeechToText::new(
        provider,
        key.to_string(),
        config.voice.stt_model.clone(),
        config.voice.language.clone(),
    ))
}

/// Send one command and wait for its feedback to finish
async fn send(config: &Config, no_audio: bool, text: &str) -> anyhow::Result<()> {
    let session = build_session(config, no_audio);

    match session.submit_text(text).await? {
        Some(outcome) => print_outcome(&session, &outcome),
        None => println!("Nothing to send"),
    }
    session.feedback().wait_idle().await;
    Ok(())
}

/// Interactive counter session
#[allow(clippy::future_not_send)]
async fn repl(config: &Config, no_audio: bool) -> anyhow::Result<()> {
    let session = build_session(config, no_audio);

    println!("voicebill ready at {}", config.server.url);
    if session.capture_available() {
        println!("Type a command, or /mic to speak. /help for more.");
    } else {
        println!("Type a command. /help for more.");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let cart = session.cart();
        print!("[{} items | ₹{}] > ", cart.item_count(), cart.grand_total());
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };
        let line = line.trim();

        match line {
            "" => {}
            "/quit" | "/exit" => break,
            "/help" => print_help(),
            "/cart" => match session.cart().preview() {
                Some(preview) => println!("{preview}"),
                None => println!("Cart is empty"),
            },
            "/mic" => listen_and_submit(&session).await,
            "/bill" => save_bill(&session, &config.data_dir).await,
            "/stats" => match session.refresh_dashboard().await {
                Some(snapshot) => print_dashboard(&snapshot),
                None => println!("Dashboard refresh is disabled"),
            },
            "/reset" => {
                session.reset().await;
                println!("Session cleared");
            }
            command if command.starts_with('/') => println!("Unknown command: {command}"),
            text => submit(&session, text).await,
        }
    }

    session.feedback().cancel();
    Ok(())
}

async fn submit(session: &SessionController, text: &str) {
    match session.submit_text(text).await {
        Ok(Some(outcome)) => print_outcome(session, &outcome),
        Ok(None) => {}
        Err(Error::Reconciliation(e)) => {
            if let Some(message) = session.message() {
                println!("{message}");
            }
            println!("! cart not updated: {e}");
        }
        Err(e) => println!("! {e}"),
    }
}

async fn listen_and_submit(session: &SessionController) {
    let handle = match session.start_capture().await {
        Ok(handle) => handle,
        Err(e) => {
            println!("! {e}");
            return;
        }
    };
    println!("Listening...");

    match session.follow_capture(handle).await {
        Ok(Some(_)) => {
            println!("Heard: {}", session.transcript());
            match session.submit().await {
                Ok(Some(outcome)) => print_outcome(session, &outcome),
                Ok(None) => {}
                Err(e) => println!("! {e}"),
            }
        }
        Ok(None) => println!("Didn't catch that"),
        Err(e) => println!("! {e}"),
    }
}

async fn save_bill(session: &SessionController, dir: &std::path::Path) {
    let (id, bytes) = match session.download_bill().await {
        Ok(bill) => bill,
        Err(e) => {
            println!("! {e}");
            return;
        }
    };

    let path = dir.join(bill_file_name(&id));
    let written = async {
        tokio::fs::create_dir_all(dir).await?;
        tokio::fs::write(&path, bytes).await
    };
    match written.await {
        Ok(()) => println!("Saved {}", path.display()),
        Err(e) => println!("! failed to save bill: {e}"),
    }
}

fn print_outcome(session: &SessionController, outcome: &SubmitOutcome) {
    println!("{}", outcome.message);

    if outcome.action == ActionType::Checkout {
        match (&outcome.transaction_id, session.bill_url()) {
            (Some(id), Some(url)) => println!("Bill {id}: {url}"),
            (Some(id), None) => println!("Bill {id}"),
            _ => {}
        }
    }
}

fn print_dashboard(snapshot: &DashboardSnapshot) {
    match &snapshot.stats {
        Some(stats) => {
            println!("Total sales:   ₹{}", stats.total_sales);
            println!("Low stock:     {}", stats.low_stock_count);
            println!("Total credit:  ₹{}", stats.total_credit);
        }
        None => println!("Stats unavailable"),
    }

    if let Some(transactions) = &snapshot.transactions {
        println!("\nRecent transactions:");
        for txn in transactions.iter().take(10) {
            println!(
                "  #{:<6} ₹{:<10} {}",
                txn.id,
                txn.total_amount,
                txn.summary.as_deref().unwrap_or("")
            );
        }
    }

    if let Some(products) = &snapshot.products {
        let low: Vec<_> = products.iter().filter(|p| p.stock_qty < 10).collect();
        if !low.is_empty() {
            println!("\nLow stock:");
            for product in low {
                println!("  {:<20} {}", product.name, product.stock_qty);
            }
        }
    }
}

fn print_help() {
    println!("  <text>   send a typed command (\"add two Maggi\")");
    println!("  /mic     speak a command");
    println!("  /cart    show the bill preview");
    println!("  /bill    save the last bill as PDF");
    println!("  /stats   show dashboard statistics");
    println!("  /reset   clear cart, transcript and last bill");
    println!("  /quit    exit");
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut recorder = AudioRecorder::new()?;
    recorder.start()?;

    println!("Sample rate: {} Hz", voicebill::voice::SAMPLE_RATE);
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = recorder.take_buffer();
        let energy = calculate_energy(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!("[{:2}s] RMS: {energy:.4} | Peak: {peak:.4} | [{meter}]", i + 1);
    }

    recorder.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check that the mic is plugged in and selected.");

    Ok(())
}
