//! Output filename templating
//!
//! Templates reference the inputs and outputs of a merge with `%` codes:
//!
//! | code | expands to |
//! |------|------------|
//! | `%if[0]`, `%if[-1]` | file name of the first / last input |
//! | `%iF[0]`, `%iF[-1]` | full path of the first / last input |
//! | `%in[0]`, `%in[-1]` | file stem of the first / last input |
//! | `%id[0]`, `%id[-1]` | directory of the first / last input |
//! | `%od`, `%of`, `%on` | output directory, file name, stem |
//! | `%mf`, `%mn` | mask file name, stem |
//!
//! Inputs are taken in stack order, most exposed first. Unknown codes are
//! copied through unchanged.

use super::ImageStack;
use std::path::{Path, PathBuf};

const DEFAULT_OUTPUT: &str = "merged.dng";

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn full_path(path: &Path) -> String {
    path.display().to_string()
}

fn expand(path: Option<&Path>, part: fn(&Path) -> String) -> String {
    path.map(part).unwrap_or_default()
}

fn directory(path: &Path) -> String {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.display().to_string(),
        _ => ".".to_string(),
    }
}

impl ImageStack {
    fn input_paths(&self) -> Vec<&Path> {
        self.layers.iter().filter_map(|l| l.source()).collect()
    }

    /// Expand the `%` codes of `template`
    pub fn replace_arguments(
        &self,
        template: &str,
        mask_file_name: &str,
        out_file_name: &str,
    ) -> String {
        let inputs = self.input_paths();
        let first = inputs.first().copied();
        let last = inputs.last().copied();
        let out = Path::new(out_file_name);
        let mask = Path::new(mask_file_name);

        let codes: [(&str, String); 13] = [
            ("%if[0]", expand(first, file_name)),
            ("%if[-1]", expand(last, file_name)),
            ("%iF[0]", expand(first, full_path)),
            ("%iF[-1]", expand(last, full_path)),
            ("%in[0]", expand(first, stem)),
            ("%in[-1]", expand(last, stem)),
            ("%id[0]", expand(first, directory)),
            ("%id[-1]", expand(last, directory)),
            ("%od", directory(out)),
            ("%of", file_name(out)),
            ("%on", stem(out)),
            ("%mf", file_name(mask)),
            ("%mn", stem(mask)),
        ];

        let mut result = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(pos) = rest.find('%') {
            result.push_str(&rest[..pos]);
            rest = &rest[pos..];
            match codes.iter().find(|(code, _)| rest.starts_with(code)) {
                Some((code, value)) => {
                    result.push_str(value);
                    rest = &rest[code.len()..];
                }
                None => {
                    result.push('%');
                    rest = &rest[1..];
                }
            }
        }
        result.push_str(rest);
        result
    }

    /// Default output path: `<dir of last input>/<first stem>-<last stem>.dng`
    pub fn build_output_file_name(&self) -> PathBuf {
        let inputs = self.input_paths();
        match (inputs.first(), inputs.last()) {
            (Some(first), Some(last)) => {
                let name = format!("{}-{}.dng", stem(first), stem(last));
                match last.parent() {
                    Some(parent) => parent.join(name),
                    None => PathBuf::from(name),
                }
            }
            _ => PathBuf::from(DEFAULT_OUTPUT),
        }
    }
}
