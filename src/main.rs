use clap::{CommandFactory, Parser};
use env_logger::Env;
use std::env;
use std::io::Error;
use std::path;
use std::process;
use whitebox_gridding::configs::get_configs;
use whitebox_gridding::tools::ToolManager;

/// Raster-grid construction for irregular point clouds and moving-window filtering.
#[derive(Parser, Debug)]
#[command(
    name = "whitebox_gridding",
    version,
    after_help = "Arguments other than the global flags are passed to the tool, e.g.\n>> whitebox_gridding -r=RasterizePoints -v --wd=\"/path/to/data/\" -i=points.csv -o=dem.asc --resolution=1.0 --reducer=surface"
)]
struct Cli {
    /// Changes the working directory; used in conjunction with --run.
    #[arg(long = "wd", visible_alias = "cd", value_name = "DIR")]
    working_directory: Option<String>,

    /// Runs a tool, e.g. -r=RasterizePoints.
    #[arg(short = 'r', long = "run", value_name = "TOOL")]
    run: Option<String>,

    /// Prints the help associated with a tool, or with every tool when no name is given.
    #[arg(long = "toolhelp", value_name = "TOOL", num_args = 0..=1, default_missing_value = "")]
    tool_help: Option<String>,

    /// Prints a tool's parameters as JSON.
    #[arg(long = "toolparameters", value_name = "TOOL")]
    tool_parameters: Option<String>,

    /// Lists all available tools.
    #[arg(long = "listtools")]
    list_tools: bool,

    /// Prints the license.
    #[arg(short = 'l', long = "license", visible_alias = "licence")]
    license: bool,

    /// Verbose mode; prints progress and info-level log messages.
    #[arg(short = 'v')]
    verbose: bool,
}

// global flags, with the single-dash long forms accepted for compatibility
const GLOBAL_FLAGS: [(&str, &str); 18] = [
    ("-r", "-r"),
    ("--run", "--run"),
    ("-run", "--run"),
    ("--wd", "--wd"),
    ("-wd", "--wd"),
    ("--cd", "--cd"),
    ("-cd", "--cd"),
    ("--toolhelp", "--toolhelp"),
    ("-toolhelp", "--toolhelp"),
    ("--toolparameters", "--toolparameters"),
    ("-toolparameters", "--toolparameters"),
    ("--listtools", "--listtools"),
    ("-listtools", "--listtools"),
    ("-l", "-l"),
    ("--license", "--license"),
    ("--licence", "--licence"),
    ("-v", "-v"),
    ("--version", "--version"),
];

const VALUE_FLAGS: [&str; 5] = ["-r", "--run", "--wd", "--cd", "--toolparameters"];

/// Splits the command line into the global flags, which are parsed by `Cli`,
/// and everything else, which is handed to the tool untouched. Global flags
/// may appear anywhere, in either `-r=Tool` or `-r Tool` form.
fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<(Cli, Vec<String>), clap::Error> {
    let mut args = args.into_iter();
    let mut globals = vec![args.next().unwrap_or_else(|| "whitebox_gridding".to_string())];
    let mut tool_args = vec![];
    let mut args = args.peekable();
    while let Some(arg) = args.next() {
        let (flag, value) = match arg.split_once('=') {
            Some((f, v)) => (f, Some(v)),
            None => (arg.as_str(), None),
        };
        let lowered = flag.to_lowercase();
        let global = GLOBAL_FLAGS.iter().find(|(alias, _)| *alias == lowered);
        match global {
            Some((_, canonical)) => {
                match value {
                    Some(v) => globals.push(format!("{}={}", canonical, v)),
                    None => {
                        globals.push(canonical.to_string());
                        if VALUE_FLAGS.contains(canonical) || *canonical == "--toolhelp" {
                            if let Some(next) = args.next_if(|a| !a.starts_with('-')) {
                                globals.push(next);
                            }
                        }
                    }
                }
            }
            None if lowered == "-h" || lowered == "--help" => globals.push("--help".to_string()),
            None => tool_args.push(arg),
        }
    }
    let cli = Cli::try_parse_from(globals)?;
    Ok((cli, tool_args))
}

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {}", err);
        process::exit(1);
    }
}

fn run() -> Result<(), Error> {
    let (cli, tool_args) = match parse_args(env::args()) {
        Ok(parsed) => parsed,
        Err(e) => e.exit(),
    };
    let configs = get_configs()?;
    let verbose = cli.verbose || configs.verbose_mode;

    env_logger::Builder::from_env(Env::default().default_filter_or(if verbose {
        "info"
    } else {
        "warn"
    }))
    .init();

    if cli.license {
        license();
        return Ok(());
    }

    let sep = path::MAIN_SEPARATOR;
    let mut working_dir = cli
        .working_directory
        .unwrap_or(configs.working_directory)
        .replace('\"', "")
        .replace('\'', "");
    if !working_dir.is_empty() && !working_dir.ends_with(sep) && !working_dir.ends_with('/') {
        working_dir.push(sep);
    }

    let tm = ToolManager::new(&working_dir, verbose, configs.max_procs);
    if let Some(tool_name) = cli.run {
        log::info!("running {} with {:?}", tool_name, tool_args);
        return tm.run_tool(&tool_name, tool_args);
    } else if let Some(tool_name) = cli.tool_help {
        return tm.tool_help(&tool_name);
    } else if let Some(tool_name) = cli.tool_parameters {
        println!("{}", tm.tool_parameters(&tool_name)?);
    } else if cli.list_tools {
        println!("{}", tm.list_tools());
    } else {
        Cli::command().print_help()?;
    }

    Ok(())
}

fn license() {
    let license_text = "whitebox_gridding License

Permission is hereby granted, free of charge, to any person obtaining a copy of this software and
associated documentation files (the \"Software\"), to deal in the Software without restriction,
including without limitation the rights to use, copy, modify, merge, publish, distribute, sublicense,
and/or sell copies of the Software, and to permit persons to whom the Software is furnished to do so,
subject to the following conditions:

The above copyright notice and this permission notice shall be included in all copies or substantial
portions of the Software.

THE SOFTWARE IS PROVIDED \"AS IS\", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING BUT
NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES
OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.";
    println!("{}", license_text);
}
