// Copyright 2024 Lexi Robinson
// Licensed under the EUPL-1.2

//! CLI front-end for the decoding pipeline: `decode-file` replays a
//! simulation file, `serve` hosts the pipeline as a line-oriented TCP
//! decoding service.
//!
//! Grounded in `wmbus_simulator.cc` for the
//! decode-file replay idea and in `decoding_server.cc`
//! for the serve protocol (newline-delimited hex in, one JSON line out
//! per request). The original server uses a non-blocking `select` loop;
//! that's an implementation strategy, not an observable behaviour, so
//! this keeps the protocol and uses a blocking accept loop with one
//! thread per connection instead — ordinary connections each get their
//! own OS thread rather than being multiplexed by hand.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use signal_hook::consts::{SIGINT, SIGTERM};

use wmbus_decode::codec::hex2bin;
use wmbus_decode::driver::registry::DriverRegistry;
use wmbus_decode::drivers;
use wmbus_decode::orchestrator::decode_telegram;
use wmbus_decode::simulation::SimulationFile;

fn usage() -> ! {
	eprintln!("usage: wmbusmeters-decode decode-file <simulation-file>");
	eprintln!("       wmbusmeters-decode serve <port>");
	std::process::exit(2);
}

fn decode_line(line: &str, registry: &DriverRegistry) -> String {
	let line = line.trim();
	let Some(bytes) = hex2bin(line) else {
		return "{\"error\":\"invalid hex\"}".to_string();
	};
	match decode_telegram(&bytes, None, registry) {
		// serde_json::to_string is already minified, so there's no need
		// for the whitespace-compaction pass the C++ server applies to
		// its (always pretty-printed) JSON before writing it out.
		Some(record) => serde_json::to_string(&record).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}")),
		None => "{\"error\":\"no application payload\"}".to_string(),
	}
}

fn decode_file(path: &str) {
	let registry = match drivers::register_all() {
		Ok(r) => r,
		Err(e) => {
			eprintln!("failed to build driver registry: {e}");
			std::process::exit(1);
		}
	};
	let text = match std::fs::read_to_string(path) {
		Ok(t) => t,
		Err(e) => {
			eprintln!("failed to read {path}: {e}");
			std::process::exit(1);
		}
	};

	let simulation = SimulationFile::parse(&text);
	for telegram in &simulation.telegrams {
		if let Some(record) = decode_telegram(&telegram.payload, None, &registry) {
			println!("{}", serde_json::to_string(&record).unwrap_or_default());
		}
	}
}

fn handle_client(stream: TcpStream, registry: Arc<DriverRegistry>) {
	let peer = stream.peer_addr().ok();
	let mut writer = match stream.try_clone() {
		Ok(w) => w,
		Err(e) => {
			warn!("(decodingserver) failed to clone client socket: {e}");
			return;
		}
	};
	let reader = BufReader::new(stream);

	for line in reader.lines() {
		let line = match line {
			Ok(l) => l,
			Err(_) => break,
		};
		if line.is_empty() {
			continue;
		}
		let response = decode_line(&line, &registry);
		if writeln!(writer, "{response}").is_err() {
			break;
		}
	}
	info!("(decodingserver) client disconnected {peer:?}");
}

fn serve(port: u16) {
	let registry = match drivers::register_all() {
		Ok(r) => Arc::new(r),
		Err(e) => {
			eprintln!("failed to build driver registry: {e}");
			std::process::exit(1);
		}
	};

	let shutdown = Arc::new(AtomicBool::new(false));
	for sig in [SIGTERM, SIGINT] {
		if let Err(e) = signal_hook::flag::register(sig, Arc::clone(&shutdown)) {
			eprintln!("failed to register signal handler: {e}");
			std::process::exit(1);
		}
	}
	// SIGPIPE: Rust's runtime already sets this to SIG_IGN before main
	// runs, so a disconnected client surfaces as a normal write error
	// rather than killing the process.

	let listener = match TcpListener::bind(("::", port)) {
		Ok(l) => l,
		Err(e) => {
			eprintln!("(decodingserver) failed to bind port {port}: {e}");
			std::process::exit(1);
		}
	};
	if let Err(e) = listener.set_nonblocking(true) {
		eprintln!("(decodingserver) failed to set listener non-blocking: {e}");
		std::process::exit(1);
	}
	info!("(decodingserver) listening on port {port}");

	while !shutdown.load(Ordering::Relaxed) {
		match listener.accept() {
			Ok((stream, addr)) => {
				if stream.set_nonblocking(false).is_err() {
					continue;
				}
				info!("(decodingserver) client connected {addr}");
				let registry = Arc::clone(&registry);
				std::thread::spawn(move || handle_client(stream, registry));
			}
			Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
				std::thread::sleep(Duration::from_millis(200));
			}
			Err(e) => {
				warn!("(decodingserver) accept failed: {e}");
			}
		}
	}
	info!("(decodingserver) stopped");
}

fn main() {
	env_logger::init();
	let args: Vec<String> = std::env::args().collect();

	match args.get(1).map(String::as_str) {
		Some("decode-file") => {
			let Some(path) = args.get(2) else { usage() };
			decode_file(path);
		}
		Some("serve") => {
			let Some(port) = args.get(2).and_then(|p| p.parse::<u16>().ok()) else { usage() };
			serve(port);
		}
		_ => usage(),
	}
}
