use clap::{App, Arg, ArgMatches, SubCommand};
use framepool::{
    error::FramePoolError, Allocator, DefaultSizeEstimator, FrameHandle, FrameHeader, FramePoolConfig,
    FrameSizeEstimator, FrameType, PixelFormat, PoolRegistry, RawFrame, Result,
};
use std::{collections::VecDeque, str::FromStr, sync::Arc, thread, time::Instant};

fn main() -> Result<()> {
    env_logger::init();

    let matches = App::new("framepool-cli")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Frame buffer pool simulation tool")
        .subcommand(
            SubCommand::with_name("capture")
                .about("Simulate capture threads acquiring and releasing frames")
                .arg(
                    Arg::with_name("frame_type")
                        .short("t")
                        .long("frame-type")
                        .value_name("TYPE")
                        .help("Frame type (depth, color, infrared, ...)")
                        .default_value("depth")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("payload")
                        .short("p")
                        .long("payload")
                        .value_name("BYTES")
                        .help("Maximum payload size per frame")
                        .default_value("1048576")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("frames")
                        .short("n")
                        .long("frames")
                        .value_name("COUNT")
                        .help("Frames captured per thread")
                        .default_value("1000")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("in_flight")
                        .short("i")
                        .long("in-flight")
                        .value_name("COUNT")
                        .help("Frames each thread holds before releasing the oldest")
                        .default_value("4")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("threads")
                        .short("j")
                        .long("threads")
                        .value_name("COUNT")
                        .help("Capture threads")
                        .default_value("1")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("max_memory_mb")
                        .short("m")
                        .long("max-memory-mb")
                        .value_name("MB")
                        .help("Global budget in megabytes, 0 = unlimited")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("config")
                        .short("c")
                        .long("config")
                        .value_name("FILE")
                        .help("TOML configuration file")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("no_reuse")
                        .long("no-reuse")
                        .help("Give every capture thread its own unshared pool"),
                ),
        )
        .subcommand(
            SubCommand::with_name("estimate")
                .about("Estimate payload capacity for an image format")
                .arg(
                    Arg::with_name("format")
                        .short("f")
                        .long("format")
                        .value_name("FORMAT")
                        .help("Pixel format (z16, y8, rgb8, ...)")
                        .required(true)
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("width")
                        .long("width")
                        .value_name("PIXELS")
                        .default_value("640")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("height")
                        .long("height")
                        .value_name("PIXELS")
                        .default_value("480")
                        .takes_value(true),
                ),
        )
        .subcommand(SubCommand::with_name("info").about("Show library information"))
        .get_matches();

    match matches.subcommand() {
        ("capture", Some(capture_matches)) => run_capture(capture_matches),
        ("estimate", Some(estimate_matches)) => run_estimate(estimate_matches),
        ("info", Some(_)) => show_info(),
        _ => {
            println!("Use --help for usage information");
            Ok(())
        }
    }
}

fn parse_arg<T: FromStr>(matches: &ArgMatches, name: &str) -> Result<T> {
    let value = matches
        .value_of(name)
        .ok_or_else(|| FramePoolError::invalid_parameter(name, "missing value"))?;
    value
        .parse()
        .map_err(|_| FramePoolError::invalid_parameter(name, format!("invalid value '{}'", value)))
}

#[derive(Debug, Default)]
struct ThreadReport {
    captured: usize,
    dropped: usize,
}

fn run_capture(matches: &ArgMatches) -> Result<()> {
    let frame_type: FrameType = parse_arg(matches, "frame_type")?;
    let payload: usize = parse_arg(matches, "payload")?;
    let frames: usize = parse_arg(matches, "frames")?;
    let in_flight: usize = parse_arg(matches, "in_flight")?;
    let threads: usize = parse_arg(matches, "threads")?;

    let mut config = match matches.value_of("config") {
        Some(path) => FramePoolConfig::from_file(path)?,
        None => FramePoolConfig::from_env()?,
    };
    if matches.is_present("max_memory_mb") {
        config.max_total_memory_mb = parse_arg(matches, "max_memory_mb")?;
    }
    if matches.is_present("no_reuse") {
        config.enable_reuse = false;
    }
    config.validate()?;

    let registry = Arc::new(PoolRegistry::with_shared_allocator());
    registry.apply_config(&config);

    println!("Simulating capture...");
    println!("Frame class: {}/{}", frame_type, payload);
    println!("Threads: {} x {} frames, {} in flight", threads, frames, in_flight);
    println!(
        "Budget: {}",
        match config.max_total_memory_mb {
            0 => "unlimited".to_string(),
            mb => format!("{} MB", mb),
        }
    );
    println!("Pool reuse: {}", config.enable_reuse);

    let start = Instant::now();
    let workers: Vec<_> = (0..threads)
        .map(|_| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || capture_loop(&registry, frame_type, payload, frames, in_flight))
        })
        .collect();

    let mut total = ThreadReport::default();
    for worker in workers {
        let report = worker
            .join()
            .map_err(|_| FramePoolError::invalid_parameter("threads", "capture thread panicked"))??;
        total.captured += report.captured;
        total.dropped += report.dropped;
    }
    let elapsed = start.elapsed();

    println!("\nResults:");
    println!("  Total time: {:.2}ms", elapsed.as_secs_f64() * 1000.0);
    println!("  Frames captured: {}", total.captured);
    println!("  Frames dropped: {}", total.dropped);
    println!(
        "  Frames/sec: {:.0}",
        total.captured as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
    );

    println!("\nPools:");
    for snapshot in registry.stats_snapshot() {
        println!(
            "  {} ({}): slot {} bytes, {} idle, {} leased",
            snapshot.name,
            if snapshot.shared { "shared" } else { "unshared" },
            snapshot.frame_total_size,
            snapshot.idle_slots,
            snapshot.leased_slots
        );
        println!("    {}", snapshot.stats.summary());
    }

    let allocator = registry.allocator();
    println!("\nAllocator:");
    println!("  Resident: {} bytes", allocator.used_size());
    println!(
        "  Allocations: {}, deallocations: {}",
        allocator.allocation_count(),
        allocator.deallocation_count()
    );

    let freed = registry.free_idle_memory();
    println!("  Idle sweep freed: {} bytes", freed);
    println!("  Resident after sweep: {} bytes", allocator.used_size());
    Ok(())
}

fn capture_loop(
    registry: &PoolRegistry,
    frame_type: FrameType,
    payload: usize,
    frames: usize,
    in_flight: usize,
) -> Result<ThreadReport> {
    let factory = registry.get_or_create::<RawFrame>(frame_type, payload)?;
    let mut held: VecDeque<FrameHandle<RawFrame>> = VecDeque::with_capacity(in_flight + 1);
    let mut report = ThreadReport::default();
    let pattern: Vec<u8> = (0..payload.min(4096)).map(|i| i as u8).collect();

    for n in 0..frames as u64 {
        let header = FrameHeader::new(frame_type, n, n * 33_333);
        match factory.acquire_frame(header)? {
            Some(mut frame) => {
                if let Some(raw) = FrameHandle::get_mut(&mut frame) {
                    raw.payload_mut().write(0, &pattern)?;
                }
                report.captured += 1;
                held.push_back(frame);
            }
            None => {
                report.dropped += 1;
                log::trace!("dropped {} frame {}", frame_type, n);
            }
        }

        while held.len() > in_flight {
            held.pop_front();
        }
    }

    Ok(report)
}

fn run_estimate(matches: &ArgMatches) -> Result<()> {
    let format: PixelFormat = parse_arg(matches, "format")?;
    let width: u32 = parse_arg(matches, "width")?;
    let height: u32 = parse_arg(matches, "height")?;

    let size = DefaultSizeEstimator.estimate(format, width, height)?;
    println!("{} {}x{}: {} bytes", format, width, height, size);
    Ok(())
}

fn show_info() -> Result<()> {
    println!("framepool v{}", framepool::VERSION);
    println!("Slot alignment: {} bytes", framepool::BUFFER_ALIGNMENT);
    println!(
        "Frame types: {}",
        FrameType::ALL.iter().map(|t| t.name()).collect::<Vec<_>>().join(", ")
    );
    Ok(())
}
