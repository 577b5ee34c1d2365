use std::{io::Write, process::ExitCode};

use clap::{Args, Parser, Subcommand};
use es::{
    host::{Host, RunContext},
    parser, tokenizer, Config, Interpreter, Value,
};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    filter::Targets, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

#[derive(Debug, Parser)]
#[command(version, about = "Runs es scripts")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Log more, repeat for more detail. `ES_LOG` overrides this.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[arg(long, global = true)]
    max_call_depth: Option<usize>,
}

impl Cli {
    pub fn command(&self) -> &Command {
        self.command.as_ref().unwrap_or(&Command::Repl)
    }

    fn config(&self) -> Config {
        let mut config = Config::default();
        if let Some(max_call_depth) = self.max_call_depth {
            config.max_call_depth = max_call_depth;
        }
        config
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a script file
    Run(FileArgs),
    /// Start an interactive session
    Repl,
    /// Print the tokens of a file
    Tokens(FileArgs),
    /// Print the parsed program of a file
    Ast(FileArgs),
}

#[derive(Debug, Args)]
struct FileArgs {
    file: String,
}

fn init_logging(verbose: u8) {
    let layer = fmt::layer().with_writer(std::io::stderr).with_target(true);
    match EnvFilter::try_from_env("ES_LOG") {
        Ok(filter) => tracing_subscriber::registry()
            .with(layer.with_filter(filter))
            .init(),
        Err(_) => {
            let level = match verbose {
                0 => LevelFilter::WARN,
                1 => LevelFilter::INFO,
                2 => LevelFilter::DEBUG,
                _ => LevelFilter::TRACE,
            };
            let targets = Targets::new()
                .with_default(LevelFilter::WARN)
                .with_target("es::lexer", level)
                .with_target("es::parser", level)
                .with_target("es::interpreter", level)
                .with_target("es::module", level);
            tracing_subscriber::registry()
                .with(layer.with_filter(targets))
                .init();
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command() {
        Command::Repl => repl_command(&cli),
        Command::Run(args) => run_command(&cli, args),
        Command::Tokens(args) => tokens_command(args),
        Command::Ast(args) => ast_command(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn read_source(file: &str) -> Result<String, String> {
    std::fs::read_to_string(file).map_err(|err| format!("Cannot read '{file}': {err}"))
}

fn interpreter(cli: &Cli) -> Result<Interpreter, String> {
    Interpreter::init(Host::stdio(), cli.config()).map_err(|err| err.to_string())
}

fn run_command(cli: &Cli, args: &FileArgs) -> Result<(), String> {
    let source = read_source(&args.file)?;
    let mut interpreter = interpreter(cli)?;
    interpreter
        .run(&source, &RunContext::new(args.file.as_str()))
        .map(|_| ())
        .map_err(|err| err.to_string())
}

fn repl_command(cli: &Cli) -> Result<(), String> {
    println!("es {}", env!("CARGO_PKG_VERSION"));
    println!("EOF to exit. (Ctrl+D on *nix, Ctrl+Z on Windows)");

    let mut interpreter = interpreter(cli)?;
    let context = RunContext::new("<repl>");
    let mut input = String::new();
    loop {
        print!("> ");
        std::io::stdout().flush().map_err(|err| err.to_string())?;

        input.clear();
        let read = std::io::stdin()
            .read_line(&mut input)
            .map_err(|err| err.to_string())?;
        if read == 0 {
            break;
        }

        match interpreter.run_session(input.trim(), &context) {
            Ok(Value::Nil) => {}
            Ok(value) => match interpreter.stringify(&value) {
                Ok(text) => println!("{text}"),
                Err(err) => println!("{err}"),
            },
            Err(err) => println!("{err}"),
        }
    }
    Ok(())
}

fn tokens_command(args: &FileArgs) -> Result<(), String> {
    let source = read_source(&args.file)?;
    let tokens = tokenizer::tokenize(&source, &args.file).map_err(|err| err.to_string())?;
    let mut line = 0;
    for token in tokens {
        if token.position.line != line {
            print!("{:4} ", token.position.line);
            line = token.position.line;
        } else {
            print!("   | ");
        }
        println!("{:<4} {:?}", token.position.column, token.kind);
    }
    Ok(())
}

fn ast_command(args: &FileArgs) -> Result<(), String> {
    let source = read_source(&args.file)?;
    let tokens = tokenizer::tokenize(&source, &args.file).map_err(|err| err.to_string())?;
    let program = parser::program(&tokens).map_err(|err| err.to_string())?;
    println!("{program}");
    Ok(())
}
