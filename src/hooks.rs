//! # Template Hooks
//!
//! User-supplied extensions to template composition, modelled as one
//! capability: a [`TemplateHook`] takes a document and returns a document.
//!
//! - The **custom fragment** hook (`customTemplateFragment`) runs before
//!   composition. Its result is overlaid on the inner document, so it can
//!   add resources and outputs or deep-merge into generated ones. Outputs it
//!   declares become environment variables of every function.
//! - The **post-process** hook (`processCFTemplate`) receives the finished
//!   inner document and may return any document at all; the result is used
//!   verbatim.
//!
//! Two implementations exist: [`FileHook`] reads a YAML or JSON document
//! from disk, [`CommandHook`] pipes the document through an external
//! program over stdin/stdout.
//!
//! Deployments also run [`ShellHook`]s: the `pre-deploy` and `post-deploy`
//! shell commands of the configuration file.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde_json::Value;

use crate::error::{Error, Result};

/// Name under which the custom fragment hook is declared.
pub const CUSTOM_FRAGMENT_HOOK: &str = "customTemplateFragment";

/// Name under which the post-process hook is declared.
pub const POST_PROCESS_HOOK: &str = "processCFTemplate";

/// Shell command run before a deployment talks to the control plane.
pub const PRE_DEPLOY_HOOK: &str = "pre-deploy";

/// Shell command run after the main stack converged.
pub const POST_DEPLOY_HOOK: &str = "post-deploy";

/// Function names that are hooks rather than deployable functions.
pub const RESERVED_FUNCTION_NAMES: [&str; 2] = [CUSTOM_FRAGMENT_HOOK, POST_PROCESS_HOOK];

pub fn is_reserved_name(name: &str) -> bool {
    RESERVED_FUNCTION_NAMES.contains(&name)
}

pub trait TemplateHook {
    /// Short name used in error messages.
    fn name(&self) -> &str;

    fn apply(&self, document: Value) -> Result<Value>;
}

/// A static document loaded from a `.yaml`, `.yml` or `.json` file.
///
/// The input document is ignored.
#[derive(Debug, Clone)]
pub struct FileHook {
    name: String,
    path: PathBuf,
}

impl FileHook {
    pub fn new(name: &str, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.to_string(),
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TemplateHook for FileHook {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, _document: Value) -> Result<Value> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| Error::Hook {
            hook: self.name.clone(),
            message: format!("cannot read {}: {}", self.path.display(), e),
        })?;
        let is_json = self
            .path
            .extension()
            .is_some_and(|extension| extension == "json");
        let document: Value = if is_json {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };
        if !document.is_object() {
            return Err(Error::Hook {
                hook: self.name.clone(),
                message: format!("{} must contain a mapping", self.path.display()),
            });
        }
        Ok(document)
    }
}

/// An external program that reads a JSON document on stdin and writes the
/// replacement document on stdout.
#[derive(Debug, Clone)]
pub struct CommandHook {
    name: String,
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl CommandHook {
    /// Build a hook from an argv list; the first element is the program.
    pub fn from_argv(name: &str, argv: &[String]) -> Result<Self> {
        let (program, args) = argv.split_first().ok_or_else(|| Error::Hook {
            hook: name.to_string(),
            message: "command is empty".to_string(),
        })?;
        Ok(Self {
            name: name.to_string(),
            program: program.clone(),
            args: args.to_vec(),
            working_dir: None,
        })
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    fn failure(&self, message: impl Into<String>) -> Error {
        Error::Hook {
            hook: self.name.clone(),
            message: message.into(),
        }
    }
}

impl TemplateHook for CommandHook {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, document: Value) -> Result<Value> {
        let input = serde_json::to_vec(&document)?;

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        log::debug!("Running {} hook: {} {:?}", self.name, self.program, self.args);
        let mut child = command
            .spawn()
            .map_err(|e| self.failure(format!("cannot start '{}': {}", self.program, e)))?;

        // The child may fill stdout before draining stdin.
        let stdin = child.stdin.take();
        let writer = std::thread::spawn(move || -> std::io::Result<()> {
            if let Some(mut stdin) = stdin {
                stdin.write_all(&input)?;
            }
            Ok(())
        });

        let output = child.wait_with_output()?;
        if let Ok(Err(e)) = writer.join() {
            // A hook that ignores stdin closes the pipe early; only its exit
            // status decides success.
            log::debug!("{} hook did not read all input: {}", self.name, e);
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.failure(format!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| self.failure(format!("output is not a JSON document: {}", e)))
    }
}

/// A shell command line run with `sh -c` in the project directory.
#[derive(Debug, Clone)]
pub struct ShellHook {
    name: String,
    command: String,
    working_dir: Option<PathBuf>,
}

impl ShellHook {
    pub fn new(name: &str, command: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            command: command.into(),
            working_dir: None,
        }
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Run the command to completion; a non-zero exit is an [`Error::Hook`]
    /// carrying its stderr.
    pub fn run(&self) -> Result<()> {
        let mut command = if cfg!(windows) {
            let mut command = Command::new("cmd");
            command.arg("/C");
            command
        } else {
            let mut command = Command::new("sh");
            command.arg("-c");
            command
        };
        command.arg(&self.command);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        log::info!("Running {} hook: {}", self.name, self.command);
        let output = command.output().map_err(|e| Error::Hook {
            hook: self.name.clone(),
            message: format!("cannot start shell: {}", e),
        })?;
        for line in String::from_utf8_lossy(&output.stdout).lines() {
            log::info!("[{}] {}", self.name, line);
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Hook {
                hook: self.name.clone(),
                message: format!(
                    "'{}' exited with {}: {}",
                    self.command,
                    output.status,
                    stderr.trim()
                ),
            });
        }
        Ok(())
    }
}
