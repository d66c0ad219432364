use clap::Parser;
use em5820::{Alignment, Config, PrintStyle, Printer, TextJob};
use std::io::{self, BufRead};
use std::process;

//
// fortune | cargo run --bin print-text -- --center --bold
//

/// Read text from stdin and print it on the thermal printer.
#[derive(Parser, Debug)]
#[command(name = "print-text", version, about, long_about = None)]
struct Cli {
    /// Print in bold
    #[arg(short, long)]
    bold: bool,

    /// Print with underline
    #[arg(short, long)]
    underline: bool,

    /// Left align (default)
    #[arg(short, long, overrides_with_all = ["center", "right"])]
    left: bool,

    /// Center align
    #[arg(short, long, overrides_with_all = ["left", "right"])]
    center: bool,

    /// Right align
    #[arg(short, long, overrides_with_all = ["left", "center"])]
    right: bool,

    /// Double width text
    #[arg(short, long)]
    wide: bool,

    /// Double height text
    #[arg(short, long)]
    tall: bool,

    /// Double width and height
    #[arg(short = 'L', long)]
    large: bool,

    /// Feed N lines after printing
    #[arg(short, long, value_name = "N", default_value_t = 2)]
    feed: u8,
}

impl Cli {
    fn job(&self) -> TextJob {
        let alignment = if self.right {
            Alignment::Right
        } else if self.center {
            Alignment::Center
        } else {
            Alignment::Left
        };

        let mut style = PrintStyle::empty();
        style.set(PrintStyle::BOLD, self.bold);
        style.set(PrintStyle::UNDERLINE, self.underline);
        style.set(PrintStyle::DOUBLE_WIDTH, self.wide || self.large);
        style.set(PrintStyle::DOUBLE_HEIGHT, self.tall || self.large);

        TextJob {
            alignment,
            style,
            feed_lines: self.feed,
        }
    }
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

/// Split input into lines without decoding it. A trailing `\r` is dropped.
fn read_lines<R: BufRead>(input: R) -> io::Result<Vec<Vec<u8>>> {
    input
        .split(b'\n')
        .map(|line| {
            line.map(|mut line| {
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                line
            })
        })
        .collect()
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let lines = read_lines(io::stdin().lock())?;

    let config = Config::new().with_env()?;
    let mut printer = Printer::new(config)?;
    cli.job().print(&mut printer, &lines)?;
    printer.close()?;
    Ok(())
}
