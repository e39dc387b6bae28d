//! Auto-pick a survey
use super::Survey;
use crate::error::Result;
use crate::model::PickType;
use crate::picker::{self, CancelToken};
use std::io::{stdout, Write};
use std::path::Path;

/// Auto-pick, fill short gaps and save the picks
///
/// Pick types are run in depth order so that each one searches below the
/// picks above it.
pub fn pick<P: AsRef<Path>>(dir: P, only: Option<PickType>) -> Result<()> {
    let mut survey = Survey::open(dir)?;
    let cancel = CancelToken::new();
    let types = match only {
        Some(pick_type) => {
            survey.config.check_pick_type(pick_type)?;
            vec![pick_type]
        }
        None => survey.config.pick_types(),
    };

    let mut out = stdout().lock();
    for pick_type in types {
        let results = picker::run(
            &survey.store,
            &mut survey.manager,
            &survey.config,
            pick_type,
            &cancel,
        )?;
        for res in &results {
            let locked = survey.manager.get(&res.key).map_or(false, |l| l.is_locked());
            let filled = if locked {
                0
            } else {
                survey.manager.interpolate_gaps(&res.key, survey.config.max_gap)?
            };
            let picked = survey.manager.get(&res.key).map_or(0, |l| {
                l.samples().iter().filter(|s| s.is_pick()).count()
            });
            writeln!(
                out,
                "{}\t{} picked\t{} demoted\t{} interpolated{}",
                res.key,
                picked,
                res.demotions.len(),
                filled,
                if locked { "\tlocked" } else { "" }
            )?;
        }
    }

    survey.save()
}
