pub mod image_analysis;
pub mod lidar_analysis;

use crate::error::GridError;
use serde::{Deserialize, Serialize};
use std::env;
use std::io::{Error, ErrorKind};
use std::path;

#[derive(Default)]
pub struct ToolManager {
    pub working_dir: String,
    pub verbose: bool,
    pub max_procs: isize,
    tool_names: Vec<String>,
}

impl ToolManager {
    pub fn new(working_directory: &str, verbose_mode: bool, max_procs: isize) -> ToolManager {
        let mut tool_names = vec![
            "CanopyHeightModel".to_string(),
            "NormalizeLidar".to_string(),
            "RasterizePoints".to_string(),
            "UserDefinedWeightsFilter".to_string(),
        ];
        tool_names.sort();

        ToolManager {
            working_dir: working_directory.to_string(),
            verbose: verbose_mode,
            max_procs,
            tool_names,
        }
    }

    fn get_tool(&self, tool_name: &str) -> Option<Box<dyn WhiteboxTool>> {
        match tool_name.to_lowercase().replace('_', "").as_ref() {
            // image_analysis
            "userdefinedweightsfilter" => {
                Some(Box::new(image_analysis::UserDefinedWeightsFilter::new()))
            }
            // lidar_analysis
            "canopyheightmodel" => Some(Box::new(lidar_analysis::CanopyHeightModel::new())),
            "normalizelidar" => Some(Box::new(lidar_analysis::NormalizeLidar::new())),
            "rasterizepoints" => Some(Box::new(lidar_analysis::RasterizePoints::new())),
            _ => None,
        }
    }

    fn unrecognized(tool_name: &str) -> Error {
        Error::new(
            ErrorKind::NotFound,
            format!("Unrecognized tool name {}.", tool_name),
        )
    }

    pub fn run_tool(&self, tool_name: &str, args: Vec<String>) -> Result<(), Error> {
        match self.get_tool(tool_name) {
            Some(tool) => {
                let mut args = args;
                if self.max_procs > 0 && !args.iter().any(|a| a.contains("-max_procs")) {
                    args.push(format!("--max_procs={}", self.max_procs));
                }
                tool.run(args, &self.working_dir, self.verbose)
            }
            None => Err(ToolManager::unrecognized(tool_name)),
        }
    }

    pub fn tool_help(&self, tool_name: &str) -> Result<(), Error> {
        if !tool_name.is_empty() {
            match self.get_tool(tool_name) {
                Some(tool) => println!("{}", get_help(tool.as_ref())),
                None => return Err(ToolManager::unrecognized(tool_name)),
            }
        } else {
            for (i, val) in self.tool_names.iter().enumerate() {
                if let Some(tool) = self.get_tool(val) {
                    println!("{}. {}\n", i + 1, get_help(tool.as_ref()));
                }
            }
        }
        Ok(())
    }

    pub fn tool_parameters(&self, tool_name: &str) -> Result<String, Error> {
        match self.get_tool(tool_name) {
            Some(tool) => Ok(tool.get_tool_parameters()),
            None => Err(ToolManager::unrecognized(tool_name)),
        }
    }

    pub fn list_tools(&self) -> String {
        let mut ret = format!("All {} Available Tools:\n", self.tool_names.len());
        for val in &self.tool_names {
            if let Some(tool) = self.get_tool(val) {
                ret.push_str(&format!(
                    "{}: {}\n\n",
                    tool.get_tool_name(),
                    tool.get_tool_description()
                ));
            }
        }
        ret
    }
}

pub trait WhiteboxTool {
    fn get_tool_name(&self) -> String;
    fn get_tool_description(&self) -> String;
    fn get_tool_parameters(&self) -> String;
    fn get_example_usage(&self) -> String;
    fn get_toolbox(&self) -> String;
    fn run<'a>(
        &self,
        args: Vec<String>,
        working_directory: &'a str,
        verbose: bool,
    ) -> Result<(), Error>;
}

fn get_help(wt: &dyn WhiteboxTool) -> String {
    let tool_name = wt.get_tool_name();
    let description = wt.get_tool_description();
    let toolbox = wt.get_toolbox();
    let parameters: Vec<ToolParameter> =
        match serde_json::from_str::<ToolParameters>(&wt.get_tool_parameters()) {
            Ok(p) => p.parameters,
            Err(_) => vec![],
        };
    let mut p = String::new();
    p.push_str("Flag               Description\n");
    p.push_str("-----------------  -----------\n");
    for d in &parameters {
        p.push_str(&format!(
            "{:width$} {}\n",
            d.flags.join(", "),
            d.description,
            width = 18
        ));
    }
    let example = wt.get_example_usage();
    if example.len() <= 1 {
        format!(
            "{}\n\nDescription:\n{}\nToolbox: {}\nParameters:\n\n{}\n",
            tool_name, description, toolbox, p
        )
    } else {
        format!(
            "{}\nDescription:\n{}\nToolbox: {}\nParameters:\n\n{}\n\nExample usage:\n{}\n",
            tool_name, description, toolbox, p, example
        )
    }
}

/// Serialises a tool's parameter list the way `get_tool_parameters` reports it.
pub fn parameters_to_json(parameters: &[ToolParameter]) -> String {
    match serde_json::to_string(parameters) {
        Ok(json_str) => format!("{{\"parameters\":{}}}", json_str),
        Err(err) => format!("{:?}", err),
    }
}

/// Builds the example-usage line for a tool, substituting the executable name.
pub fn example_usage(tool_name: &str, args: &str) -> String {
    let sep: String = path::MAIN_SEPARATOR.to_string();
    let p = env::current_dir()
        .map(|d| d.display().to_string())
        .unwrap_or_default();
    let e = env::current_exe()
        .map(|d| d.display().to_string())
        .unwrap_or_default();
    let mut short_exe = e
        .replace(&p, "")
        .replace(".exe", "")
        .replace('.', "")
        .replace(&sep, "");
    if e.contains(".exe") {
        short_exe += ".exe";
    }
    format!(
        ">>.*{} -r={} -v --wd=\"*path*to*data*\" {}",
        short_exe, tool_name, args
    )
    .replace('*', &sep)
}

#[derive(Serialize, Deserialize, Debug)]
struct ToolParameters {
    parameters: Vec<ToolParameter>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ToolParameter {
    pub name: String,
    pub flags: Vec<String>,
    pub description: String,
    pub parameter_type: ParameterType,
    pub default_value: Option<String>,
    pub optional: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum ParameterType {
    Boolean,
    String,
    Integer,
    Float,
    ExistingFile(ParameterFileType),
    NewFile(ParameterFileType),
    OptionList(Vec<String>),
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum ParameterFileType {
    Any,
    Lidar,
    Raster,
    Text,
    Csv,
}

/// Tool arguments of the form `-flag=value`, `--flag value`, or a bare
/// `--flag` switch.
#[derive(Debug, Default)]
pub struct ToolArgs {
    values: Vec<(String, Option<String>)>,
}

impl ToolArgs {
    pub fn parse(args: &[String]) -> ToolArgs {
        let mut values = vec![];
        for i in 0..args.len() {
            let arg = args[i].replace('\"', "").replace('\'', "");
            if !arg.starts_with('-') || arg.parse::<f64>().is_ok() {
                continue;
            }
            let vec = arg.splitn(2, '=').collect::<Vec<&str>>();
            let flag_val = vec[0].to_lowercase().replace("--", "-");
            let value = if vec.len() > 1 {
                Some(vec[1].to_string())
            } else {
                match args.get(i + 1) {
                    Some(next) if !next.starts_with('-') || next.parse::<f64>().is_ok() => {
                        Some(next.replace('\"', "").replace('\'', ""))
                    }
                    _ => None,
                }
            };
            values.push((flag_val, value));
        }
        ToolArgs { values }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn find(&self, flags: &[&str]) -> Option<&(String, Option<String>)> {
        self.values
            .iter()
            .rev()
            .find(|(f, _)| flags.iter().any(|flag| f == flag))
    }

    /// The string value of the first matching flag.
    pub fn get(&self, flags: &[&str]) -> Option<String> {
        self.find(flags).and_then(|(_, v)| v.clone())
    }

    /// A boolean switch; present without a value, or with any value other than `false`.
    pub fn flag(&self, flags: &[&str]) -> bool {
        match self.find(flags) {
            Some((_, Some(v))) => v.to_lowercase() != "false",
            Some((_, None)) => true,
            None => false,
        }
    }

    pub fn get_f64(&self, flags: &[&str], name: &'static str) -> Result<Option<f64>, Error> {
        match self.get(flags) {
            Some(v) => match v.trim().parse::<f64>() {
                Ok(f) => Ok(Some(f)),
                Err(_) => Err(GridError::invalid_parameter(name, v).into()),
            },
            None => Ok(None),
        }
    }

    pub fn get_usize(&self, flags: &[&str], name: &'static str) -> Result<Option<usize>, Error> {
        match self.get(flags) {
            Some(v) => match v.trim().parse::<f64>() {
                Ok(f) if f >= 0.0 => Ok(Some(f as usize)),
                _ => Err(GridError::invalid_parameter(name, v).into()),
            },
            None => Ok(None),
        }
    }

    /// The value of a required flag, or an `InvalidInput` error naming it.
    pub fn require(&self, flags: &[&str], name: &'static str) -> Result<String, Error> {
        self.get(flags).ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidInput,
                format!("The required parameter '{}' was not specified.", name),
            )
        })
    }
}

/// Prefixes `file_name` with the working directory unless it is already a path.
pub fn resolve_path(file_name: &str, working_directory: &str) -> String {
    let sep: String = path::MAIN_SEPARATOR.to_string();
    if !file_name.contains(&sep) && !file_name.contains('/') {
        format!("{}{}", working_directory, file_name)
    } else {
        file_name.to_string()
    }
}

/// Prints the welcome banner used by every tool in verbose mode.
pub fn print_banner(tool_name: &str) {
    println!("***************{}", "*".repeat(tool_name.len()));
    println!("* Welcome to {} *", tool_name);
    println!("***************{}", "*".repeat(tool_name.len()));
}

/// Parses a comma-separated list of class values such as `'7,18'`.
pub fn parse_class_list(s: &str, name: &'static str) -> Result<Vec<f64>, Error> {
    let mut classes = vec![];
    for v in s.split(',').map(|v| v.trim()).filter(|v| !v.is_empty()) {
        match v.parse::<f64>() {
            Ok(c) => classes.push(c),
            Err(_) => return Err(GridError::invalid_parameter(name, s).into()),
        }
    }
    Ok(classes)
}
