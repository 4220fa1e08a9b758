use axum::{
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use clap::{Parser, Subcommand};
use hound::WavSpec;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tonelink_core::tx::samples_to_pcm;
use tonelink_core::{
    Message, MessageType, Receiver, RxListener, Symbol, ToneModulator, SAMPLE_RATE,
};
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tonelink")]
#[command(about = "4-FSK acoustic modem for short addressed messages")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a text message into a WAV audio file
    Send {
        /// Message text
        text: String,

        /// Output WAV file
        #[arg(value_name = "OUTPUT.WAV")]
        output: PathBuf,

        /// Sender address (0-255)
        #[arg(long, default_value = "1")]
        from: u8,

        /// Destination address; omitted means broadcast announce
        #[arg(long)]
        to: Option<u8>,
    },

    /// Decode a WAV audio file and print recovered messages
    Recv {
        /// Input WAV file
        #[arg(value_name = "INPUT.WAV")]
        input: PathBuf,

        /// Also print the raw symbol stream
        #[arg(long)]
        symbols: bool,
    },

    /// Start an HTTP encode/decode service
    Serve {
        /// Port to listen on (default: 8000)
        #[arg(short, long, default_value = "8000")]
        port: u16,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Send {
            text,
            output,
            from,
            to,
        } => send_command(&text, &output, from, to),
        Commands::Recv { input, symbols } => recv_command(&input, symbols),
        Commands::Serve { port } => start_web_server(port),
    }
}

fn send_command(
    text: &str,
    output: &PathBuf,
    from: u8,
    to: Option<u8>,
) -> Result<(), Box<dyn std::error::Error>> {
    let msg = match to {
        Some(dst) => Message::direct(from, dst, text),
        None => Message::announce(from, text),
    };
    let payload = msg.encode();
    let samples = ToneModulator::new().modulate_frame(&payload);
    println!(
        "Encoded {} byte message to {} audio samples",
        payload.len(),
        samples.len()
    );

    let file = File::create(output)?;
    let mut writer = hound::WavWriter::new(file, wav_spec())?;
    for sample in samples {
        let clamped = sample.max(-1.0).min(1.0);
        writer.write_sample((clamped * 32767.0) as i16)?;
    }
    writer.finalize()?;

    println!("Wrote {}", output.display());
    Ok(())
}

fn recv_command(input: &PathBuf, show_symbols: bool) -> Result<(), Box<dyn std::error::Error>> {
    let samples = read_wav_samples(File::open(input)?)?;
    println!("Read {} samples from {}", samples.len(), input.display());

    let symbol_log = Arc::new(Mutex::new(Vec::<Symbol>::new()));
    let packet_count = Arc::new(Mutex::new(0usize));

    let log = symbol_log.clone();
    let count = packet_count.clone();
    let mut listener = RxListener {
        on_symbol: Some(Box::new(move |sym| log.lock().unwrap().push(sym))),
        on_byte_progress: None,
        on_packet: Some(Box::new(move |payload| {
            *count.lock().unwrap() += 1;
            match Message::decode(payload) {
                Ok(msg) => println!("{}", describe_message(&msg)),
                Err(_) => println!("packet ({} bytes): {}", payload.len(), hex(payload)),
            }
        })),
    };

    let mut rx = Receiver::new(Cursor::new(samples_to_pcm(&samples)));
    rx.run(&mut listener)?;

    let symbol_log = symbol_log.lock().unwrap();
    if show_symbols {
        let line: Vec<String> = symbol_log.iter().map(|s| s.to_string()).collect();
        println!("symbols: {}", line.join(""));
    }
    println!(
        "Done: {} symbol windows, {} packets",
        symbol_log.len(),
        *packet_count.lock().unwrap()
    );
    Ok(())
}

fn describe_message(msg: &Message) -> String {
    let kind = match msg.kind {
        MessageType::Direct => "direct".to_string(),
        MessageType::Announce => "announce".to_string(),
        MessageType::Other(v) => format!("type {}", v),
    };
    if msg.is_broadcast() {
        format!("[{}] broadcast from {}: {}", kind, msg.src, msg.text())
    } else {
        format!("[{}] {} -> {}: {}", kind, msg.src, msg.dst, msg.text())
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn wav_spec() -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE as u32,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

/// Read WAV samples as mono f32 at the modem sample rate. Stereo input is
/// averaged down; other sample rates are rejected since the link has no
/// resampler.
fn read_wav_samples<R: Read>(reader: R) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
    let mut reader = hound::WavReader::new(reader)?;
    let spec = reader.spec();

    let mut samples: Vec<f32> = match spec.bits_per_sample {
        16 => {
            let int_samples: Result<Vec<i16>, _> = reader.samples::<i16>().collect();
            int_samples?
                .into_iter()
                .map(|s| s as f32 / 32768.0)
                .collect()
        }
        32 => {
            let float_samples: Result<Vec<f32>, _> = reader.samples::<f32>().collect();
            float_samples?
        }
        _ => {
            return Err(format!("Unsupported bit depth: {}", spec.bits_per_sample).into());
        }
    };

    if spec.channels == 2 {
        samples = samples.chunks_exact(2).map(|p| (p[0] + p[1]) / 2.0).collect();
    } else if spec.channels != 1 {
        return Err(format!("Unsupported channel count: {}", spec.channels).into());
    }

    if spec.sample_rate != SAMPLE_RATE as u32 {
        return Err(format!(
            "Expected {} Hz audio, got {} Hz",
            SAMPLE_RATE, spec.sample_rate
        )
        .into());
    }

    Ok(samples)
}

// --- HTTP service -----------------------------------------------------

#[derive(Serialize, Deserialize)]
struct EncodeRequest {
    text: String,
    #[serde(default = "default_src")]
    src: u8,
    /// Destination address; absent means broadcast announce
    dst: Option<u8>,
}

fn default_src() -> u8 {
    1
}

#[derive(Serialize, Deserialize)]
struct EncodeResponse {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    wav_base64: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct DecodeRequest {
    wav_base64: String,
}

#[derive(Serialize, Deserialize)]
struct PacketView {
    #[serde(skip_serializing_if = "Option::is_none")]
    src: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dst: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data_base64: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct DecodeResponse {
    success: bool,
    message: String,
    packets: Vec<PacketView>,
}

#[tokio::main]
async fn start_web_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    println!("Starting tonelink server on http://localhost:{}", port);
    println!("Endpoints:");
    println!("  POST /encode - Encode a text message to WAV audio");
    println!("  POST /decode - Decode WAV audio to messages");
    println!("  GET / - Server status");

    let app = Router::new()
        .route("/", get(handler_status))
        .route("/encode", post(handler_encode))
        .route("/decode", post(handler_decode))
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn handler_status() -> &'static str {
    "tonelink 4-FSK modem server - Ready"
}

async fn handler_encode(
    Json(req): Json<EncodeRequest>,
) -> Result<Json<EncodeResponse>, (StatusCode, Json<EncodeResponse>)> {
    let msg = match req.dst {
        Some(dst) => Message::direct(req.src, dst, &req.text),
        None => Message::announce(req.src, &req.text),
    };
    let payload = msg.encode();
    let samples = ToneModulator::new().modulate_frame(&payload);

    let wav_data = wav_bytes(&samples).map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(EncodeResponse {
                success: false,
                message: format!("Failed to build WAV: {}", e),
                wav_base64: None,
            }),
        )
    })?;

    let wav_base64 = base64::engine::general_purpose::STANDARD.encode(&wav_data);
    Ok(Json(EncodeResponse {
        success: true,
        message: format!(
            "Encoded {} byte message to {} samples",
            payload.len(),
            samples.len()
        ),
        wav_base64: Some(wav_base64),
    }))
}

async fn handler_decode(
    Json(req): Json<DecodeRequest>,
) -> Result<Json<DecodeResponse>, (StatusCode, Json<DecodeResponse>)> {
    let bad_request = |message: String| {
        (
            StatusCode::BAD_REQUEST,
            Json(DecodeResponse {
                success: false,
                message,
                packets: Vec::new(),
            }),
        )
    };

    let wav_data = base64::engine::general_purpose::STANDARD
        .decode(&req.wav_base64)
        .map_err(|e| bad_request(format!("Invalid base64 WAV data: {}", e)))?;

    if wav_data.is_empty() {
        return Err(bad_request("No WAV data provided".to_string()));
    }

    let samples = read_wav_samples(Cursor::new(&wav_data))
        .map_err(|e| bad_request(format!("Failed to read WAV: {}", e)))?;

    let payloads = Arc::new(Mutex::new(Vec::<Vec<u8>>::new()));
    let sink = payloads.clone();
    let mut listener = RxListener {
        on_packet: Some(Box::new(move |p| sink.lock().unwrap().push(p.to_vec()))),
        ..Default::default()
    };

    let mut rx = Receiver::new(Cursor::new(samples_to_pcm(&samples)));
    rx.run(&mut listener)
        .map_err(|e| bad_request(format!("Receive failed: {}", e)))?;

    let payloads = payloads.lock().unwrap();
    let packets: Vec<PacketView> = payloads.iter().map(|p| packet_view(p)).collect();

    Ok(Json(DecodeResponse {
        success: true,
        message: format!("Decoded {} packets", packets.len()),
        packets,
    }))
}

fn packet_view(payload: &[u8]) -> PacketView {
    match Message::decode(payload) {
        Ok(msg) => PacketView {
            src: Some(msg.src),
            dst: Some(msg.dst),
            kind: Some(match msg.kind {
                MessageType::Direct => "direct".to_string(),
                MessageType::Announce => "announce".to_string(),
                MessageType::Other(v) => v.to_string(),
            }),
            text: Some(msg.text()),
            data_base64: None,
        },
        Err(_) => PacketView {
            src: None,
            dst: None,
            kind: None,
            text: None,
            data_base64: Some(base64::engine::general_purpose::STANDARD.encode(payload)),
        },
    }
}

fn wav_bytes(samples: &[f32]) -> Result<Vec<u8>, hound::Error> {
    let mut wav_data = Vec::new();
    {
        let cursor = Cursor::new(&mut wav_data);
        let mut writer = hound::WavWriter::new(cursor, wav_spec())?;
        for &sample in samples {
            let clamped = sample.max(-1.0).min(1.0);
            writer.write_sample((clamped * 32767.0) as i16)?;
        }
        writer.finalize()?;
    }
    Ok(wav_data)
}
