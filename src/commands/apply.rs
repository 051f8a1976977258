use anyhow::{Context as _, Result};
use std::io::IsTerminal as _;
use std::sync::Arc;

use super::CommandContext;
use crate::cli::{ApplyOpts, GlobalOpts};
use crate::engine::{
    AmbiguityResolver, ApplyOptions, CancelAll, FirstCandidate, Preselected, PromptResolver,
};
use crate::interrupt::Interrupt;
use crate::logging::Logger;

/// Run `apply`, or `manage` when `manage` is set.
///
/// # Errors
///
/// Returns an error if the apply failed (after rollback) or any directory
/// could not be deployed.
pub fn run(global: &GlobalOpts, opts: &ApplyOpts, log: &Arc<Logger>, manage: bool) -> Result<()> {
    let ctx = CommandContext::init(global, log)?;
    let _lock = ctx.lock()?;
    let interrupt = Interrupt::install().context("installing the Ctrl-C handler")?;

    let mut engine = ctx
        .engine()?
        .with_resolver(resolver(opts))
        .with_interrupt(interrupt);
    let options = apply_options(opts, global.dry_run);
    let report = if manage {
        engine.manage(&opts.rice, &options)
    } else {
        engine.apply(&opts.rice, &options)
    };

    for line in report.summary().lines() {
        log.info(line);
    }
    log.print_summary();

    let report = report
        .into_result()
        .with_context(|| format!("applying {}", opts.rice))?;
    let failed = report.directories.failures.len();
    if failed > 0 {
        anyhow::bail!(
            "{failed} director{} of {} could not be deployed",
            if failed == 1 { "y" } else { "ies" },
            opts.rice
        );
    }
    Ok(())
}

/// Engine options from the command line.
#[must_use]
pub fn apply_options(opts: &ApplyOpts, dry_run: bool) -> ApplyOptions {
    ApplyOptions {
        skip_packages: opts.skip_packages,
        targets: opts.target_packages.clone(),
        link_options: opts
            .stow_options
            .as_deref()
            .map(|o| o.split_whitespace().map(String::from).collect())
            .unwrap_or_default(),
        destination: opts.overwrite_sym.clone(),
        custom_paths: opts.custom_paths.clone(),
        ignore_rules: opts.ignore_rules,
        template_context: template_context(&opts.vars),
        dry_run,
    }
}

/// JSON object of `--var` pairs; `None` without any.
#[must_use]
pub fn template_context(vars: &[(String, String)]) -> Option<serde_json::Value> {
    if vars.is_empty() {
        return None;
    }
    let map = vars
        .iter()
        .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
        .collect();
    Some(serde_json::Value::Object(map))
}

/// `--choose`, then `--first-variant`, then a prompt when stdin is a
/// terminal; otherwise ambiguity cancels.
fn resolver(opts: &ApplyOpts) -> Arc<dyn AmbiguityResolver> {
    if let Some(choice) = &opts.choose {
        Arc::new(Preselected(choice.clone()))
    } else if opts.first_variant {
        Arc::new(FirstCandidate)
    } else if std::io::stdin().is_terminal() {
        Arc::new(PromptResolver)
    } else {
        Arc::new(CancelAll)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::path::PathBuf;

    #[derive(Parser, Debug)]
    struct Wrapper {
        #[command(flatten)]
        opts: ApplyOpts,
    }

    fn parse(args: &[&str]) -> ApplyOpts {
        Wrapper::parse_from(args).opts
    }

    #[test]
    fn options_map_flags() {
        let opts = parse(&[
            "apply",
            "gruvbox",
            "--stow-options",
            "--no-folding  --adopt",
            "--overwrite-sym",
            "/tmp/cfg",
            "--custom-paths",
            "a,b/c",
        ]);
        let options = apply_options(&opts, true);
        assert_eq!(options.link_options, vec!["--no-folding", "--adopt"]);
        assert_eq!(options.destination, Some(PathBuf::from("/tmp/cfg")));
        assert_eq!(options.custom_paths, vec!["a", "b/c"]);
        assert!(options.dry_run);
        assert!(options.template_context.is_none());
    }

    #[test]
    fn vars_become_string_context() {
        let context = template_context(&[
            ("accent".to_string(), "#ff0000".to_string()),
            ("font".to_string(), "Iosevka".to_string()),
        ])
        .unwrap();
        assert_eq!(context["accent"], "#ff0000");
        assert_eq!(context["font"], "Iosevka");
    }

    #[test]
    fn choose_wins_over_prompt() {
        let opts = parse(&["manage", "gruvbox", "--choose", "light"]);
        let chosen = resolver(&opts).resolve(&["dark".to_string(), "light".to_string()]);
        assert_eq!(chosen, crate::engine::Resolution::Choice("light".to_string()));
    }
}
