use std::fmt;

use anyhow::{bail, Result};
use bronze_parser::{TableTransform, CENSUS_G01, CENSUS_G02, LGA_CODES, LGA_SUBURBS, LISTINGS};

use crate::config::PrefixConfig;
use crate::enumerate::FileSelector;
use crate::loader::LoadPolicy;

pub const BRONZE_LOAD_PLAN: &str = "bronze-load";
pub const MONTHLY_PLAN: &str = "monthly";
pub const PLAN_NAMES: &[&str] = &[BRONZE_LOAD_PLAN, MONTHLY_PLAN];

/// One feed: where its files live, how they are picked, transformed and
/// written.
#[derive(Clone)]
pub struct PipelineDefinition {
    pub code: &'static str,
    pub prefix: String,
    pub selector: FileSelector,
    pub transform: &'static dyn TableTransform,
    pub policy: LoadPolicy,
}

impl PipelineDefinition {
    pub fn table(&self) -> &'static str {
        self.transform.schema().table
    }
}

impl fmt::Debug for PipelineDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineDefinition")
            .field("code", &self.code)
            .field("prefix", &self.prefix)
            .field("selector", &self.selector)
            .field("transform", &self.transform.name())
            .field("policy", &self.policy)
            .finish()
    }
}

fn pattern(glob: &str) -> FileSelector {
    FileSelector::Pattern(glob.to_string())
}

pub fn all_pipelines(prefixes: &PrefixConfig) -> Vec<PipelineDefinition> {
    vec![
        PipelineDefinition {
            code: "airbnb_historical",
            prefix: prefixes.airbnb.clone(),
            selector: pattern("*.csv"),
            transform: &LISTINGS,
            policy: LoadPolicy::Append,
        },
        PipelineDefinition {
            code: "airbnb_monthly",
            prefix: prefixes.monthly.clone(),
            selector: FileSelector::Monthly,
            transform: &LISTINGS,
            policy: LoadPolicy::ReplaceSource,
        },
        PipelineDefinition {
            code: "census_g01",
            prefix: prefixes.census.clone(),
            selector: pattern("2016Census_G01_NSW_LGA.csv"),
            transform: &CENSUS_G01,
            policy: LoadPolicy::Append,
        },
        PipelineDefinition {
            code: "census_g02",
            prefix: prefixes.census.clone(),
            selector: pattern("2016Census_G02_NSW_LGA.csv"),
            transform: &CENSUS_G02,
            policy: LoadPolicy::Append,
        },
        PipelineDefinition {
            code: "lga_code",
            prefix: prefixes.census.clone(),
            selector: pattern("NSW_LGA_CODE.csv"),
            transform: &LGA_CODES,
            policy: LoadPolicy::Append,
        },
        PipelineDefinition {
            code: "lga_suburb",
            prefix: prefixes.census.clone(),
            selector: pattern("NSW_LGA_SUBURB.csv"),
            transform: &LGA_SUBURBS,
            policy: LoadPolicy::Append,
        },
    ]
}

pub fn pipeline_by_code(prefixes: &PrefixConfig, code: &str) -> Option<PipelineDefinition> {
    all_pipelines(prefixes)
        .into_iter()
        .find(|pipeline| pipeline.code == code)
}

/// Ordered stages; every task of a stage must succeed before the next starts.
#[derive(Debug, Clone)]
pub struct Plan {
    pub name: &'static str,
    pub stages: Vec<Vec<PipelineDefinition>>,
}

impl Plan {
    pub fn pipelines(&self) -> impl Iterator<Item = &PipelineDefinition> {
        self.stages.iter().flatten()
    }
}

fn stage(prefixes: &PrefixConfig, codes: &[&str]) -> Result<Vec<PipelineDefinition>> {
    codes
        .iter()
        .map(|code| match pipeline_by_code(prefixes, code) {
            Some(pipeline) => Ok(pipeline),
            None => bail!("unknown pipeline '{code}'"),
        })
        .collect()
}

pub fn plan_by_name(name: &str, prefixes: &PrefixConfig) -> Result<Plan> {
    match name {
        BRONZE_LOAD_PLAN => Ok(Plan {
            name: BRONZE_LOAD_PLAN,
            stages: vec![
                stage(prefixes, &["airbnb_historical"])?,
                stage(
                    prefixes,
                    &["census_g01", "census_g02", "lga_code", "lga_suburb"],
                )?,
            ],
        }),
        MONTHLY_PLAN => Ok(Plan {
            name: MONTHLY_PLAN,
            stages: vec![stage(prefixes, &["airbnb_monthly"])?],
        }),
        other => bail!(
            "unknown plan '{other}' (expected one of: {})",
            PLAN_NAMES.join(", ")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bronze_load_runs_listings_before_reference_tables() {
        let plan = plan_by_name(BRONZE_LOAD_PLAN, &PrefixConfig::default()).unwrap();
        let codes: Vec<Vec<&str>> = plan
            .stages
            .iter()
            .map(|stage| stage.iter().map(|pipeline| pipeline.code).collect())
            .collect();
        assert_eq!(
            codes,
            vec![
                vec!["airbnb_historical"],
                vec!["census_g01", "census_g02", "lga_code", "lga_suburb"],
            ]
        );
    }

    #[test]
    fn monthly_feed_replaces_by_source_file() {
        let plan = plan_by_name(MONTHLY_PLAN, &PrefixConfig::default()).unwrap();
        let pipeline = plan.pipelines().next().unwrap();
        assert_eq!(pipeline.policy, LoadPolicy::ReplaceSource);
        assert_eq!(pipeline.selector, FileSelector::Monthly);
        assert_eq!(pipeline.table(), "bronze.airbnb_listings_raw");
    }

    #[test]
    fn stages_never_share_a_destination_table() {
        for name in PLAN_NAMES {
            let plan = plan_by_name(name, &PrefixConfig::default()).unwrap();
            for stage in &plan.stages {
                let mut tables: Vec<&str> = stage.iter().map(PipelineDefinition::table).collect();
                tables.sort();
                let before = tables.len();
                tables.dedup();
                assert_eq!(before, tables.len(), "stage of {name} shares a table");
            }
        }
    }

    #[test]
    fn prefixes_come_from_configuration() {
        let prefixes = PrefixConfig {
            airbnb: "raw/airbnb".into(),
            monthly: "raw/monthly".into(),
            census: "raw/census".into(),
        };
        let monthly = pipeline_by_code(&prefixes, "airbnb_monthly").unwrap();
        assert_eq!(monthly.prefix, "raw/monthly");
        let suburbs = pipeline_by_code(&prefixes, "lga_suburb").unwrap();
        assert_eq!(suburbs.prefix, "raw/census");
    }

    #[test]
    fn unknown_plan_is_rejected() {
        let err = plan_by_name("weekly", &PrefixConfig::default()).unwrap_err();
        assert!(err.to_string().contains("bronze-load"));
    }
}
