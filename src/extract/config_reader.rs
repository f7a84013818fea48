use crate::extract::*;

/// The optional JSON file describing what to extract. Every key may be
/// omitted, in which case the default target is used for it.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetConfig {
    pub years: Option<Vec<i32>>,
    pub uf: Option<String>,
    pub cargo: Option<String>,
    #[serde(rename = "firstName")]
    pub first_name: Option<String>,
    #[serde(rename = "lastName")]
    pub last_name: Option<String>,
    #[serde(rename = "nameVariants")]
    pub name_variants: Option<Vec<String>>,
}

impl TargetConfig {
    pub fn into_target(self) -> ExtractResult<Target> {
        let default = Target::default();
        let mut years = self.years.unwrap_or(default.years);
        years.sort_unstable();
        years.dedup();
        if years.is_empty() {
            whatever!("the list of years to extract is empty");
        }
        let name_variants = self.name_variants.unwrap_or(default.name_variants);
        if name_variants.is_empty() {
            whatever!("the list of candidate name variants is empty");
        }
        Ok(Target {
            years,
            uf: self.uf.unwrap_or(default.uf).to_uppercase(),
            cargo: self.cargo.unwrap_or(default.cargo),
            first_name: self.first_name.unwrap_or(default.first_name),
            last_name: self.last_name.unwrap_or(default.last_name),
            name_variants,
        })
    }
}

/// Reads the target from the given file, or returns the default target.
pub fn read_target(path: Option<&str>) -> ExtractResult<Target> {
    match path {
        None => Ok(Target::default()),
        Some(p) => {
            let contents = fs::read_to_string(p).context(OpeningFileSnafu { path: p })?;
            let config: TargetConfig =
                serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
            info!("target config: {:?}", config);
            config.into_target()
        }
    }
}
