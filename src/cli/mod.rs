//! Command line interface
//!
//! Every subcommand works on a survey directory holding `traces/`, an
//! optional `survey.json`, and the `project/` directory where picks and the
//! tide curve are saved between runs.
use crate::config::SurveyConfig;
use crate::error::Result;
use crate::model::PickType;
use crate::picks::PickLineManager;
use crate::project::Project;
use crate::store::TraceStore;
use clap::{ArgAction, Parser};
use std::path::{Path, PathBuf};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(version, about = "Pick and correct depth-sounder survey lines")]
pub struct Args {
    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
    #[command(subcommand)]
    pub cmd: Action,
}

/// Subcommands
#[derive(clap::Subcommand, Debug)]
pub enum Action {
    /// Summarize the lines, picks and tide of a survey
    Info { dir: PathBuf },
    /// Auto-pick every pick type, or only the one given
    Pick {
        dir: PathBuf,
        #[arg(short, long)]
        pick_type: Option<PickType>,
    },
    /// Import a tide file into the project
    Tide { dir: PathBuf, file: PathBuf },
    /// Manually set traces START..END (END exclusive) of a pick line
    Edit {
        dir: PathBuf,
        line: String,
        pick_type: PickType,
        start: usize,
        end: usize,
        /// Depth to set; without it the traces are marked "no pick"
        #[arg(short, long)]
        depth: Option<f64>,
        /// Return the traces to the unpicked state instead
        #[arg(long, conflicts_with = "depth")]
        clear: bool,
    },
    /// Lock or unlock a pick line
    Lock {
        dir: PathBuf,
        line: String,
        pick_type: PickType,
        #[arg(long)]
        unlock: bool,
    },
    /// Export corrected survey points
    Export {
        dir: PathBuf,
        output: PathBuf,
        /// Omit pre-impoundment elevation and sediment thickness
        #[arg(long)]
        no_pre: bool,
    },
}

/// Run a parsed command line
pub fn run(args: Args) -> Result<()> {
    match args.cmd {
        Action::Info { dir } => {
            info::info(dir)?;
        }
        Action::Pick { dir, pick_type } => {
            pick::pick(dir, pick_type)?;
        }
        Action::Tide { dir, file } => {
            tide::tide(dir, file)?;
        }
        Action::Edit {
            dir,
            line,
            pick_type,
            start,
            end,
            depth,
            clear,
        } => {
            edit::edit(dir, &line, pick_type, start..end, depth, clear)?;
        }
        Action::Lock {
            dir,
            line,
            pick_type,
            unlock,
        } => {
            edit::lock(dir, &line, pick_type, !unlock)?;
        }
        Action::Export {
            dir,
            output,
            no_pre,
        } => {
            export::export(dir, output, no_pre)?;
        }
    };
    Ok(())
}

/// A survey opened with its saved picks
pub(crate) struct Survey {
    pub config: SurveyConfig,
    pub store: TraceStore,
    pub manager: PickLineManager,
    pub project: Project,
}

impl Survey {
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let config = SurveyConfig::load(dir)?;
        let store = TraceStore::open(dir)?;
        let mut manager = PickLineManager::for_store(&store);
        let project = Project::new(dir);
        project.load_picks(&mut manager)?;
        Ok(Survey {
            config,
            store,
            manager,
            project,
        })
    }

    pub fn save(&self) -> Result<()> {
        self.project.save_picks(&self.manager)
    }
}

pub mod edit;
pub mod export;
pub mod info;
pub mod pick;
pub mod tide;
