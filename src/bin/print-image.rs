use clap::Parser;
use em5820::{job, Config, Error, Printer, RasterImage};
use std::path::PathBuf;
use std::process;

//
// cargo run --bin print-image -- photo.jpg
//

/// Print an image on the thermal printer.
#[derive(Parser, Debug)]
#[command(name = "print-image", version, about, long_about = None)]
#[command(after_help = "Supported formats: JPG, PNG, BMP, TGA, GIF")]
struct Cli {
    /// Image file to print
    image: PathBuf,
}

fn main() {
    dotenvy::dotenv().ok();

    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "[{}:{}] {} - {}",
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.level(),
                record.args()
            )
        })
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() { 1 } else { 0 };
            err.print().ok();
            process::exit(code);
        }
    };

    if let Err(err) = run(&cli) {
        eprintln!("Error: {}", err);
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), Error> {
    let config = Config::new().with_env()?;

    println!("Loading and processing image: {}", cli.image.display());
    let image = RasterImage::open(&cli.image)?;
    println!(
        "Loaded image: {}x{} ({} channels)",
        image.width(),
        image.height(),
        image.channels()
    );

    let bitmap = job::prepare_image(&image, config.get_max_width());
    println!(
        "Final bitmap: {}x{} ({} bytes)",
        bitmap.width(),
        bitmap.height(),
        bitmap.as_bytes().len()
    );

    println!("Connecting to printer...");
    let mut printer = Printer::new(config)?;

    println!("Printing image...");
    let sent = job::print_image(&mut printer, &bitmap)?;
    printer.close()?;

    println!("Done! ({} bytes sent)", sent);
    Ok(())
}
