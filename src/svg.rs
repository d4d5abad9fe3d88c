use crate::stats::Stats;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

const MAX_LANGUAGES: usize = 8;
const DEFAULT_LANGUAGE_COLOR: &str = "#000000";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

pub struct ThemeColors {
    pub background: &'static str,
    pub border: &'static str,
    pub title: &'static str,
    pub text: &'static str,
    pub muted: &'static str,
    pub accent: &'static str,
}

impl Theme {
    pub const ALL: [Theme; 2] = [Theme::Light, Theme::Dark];

    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn colors(self) -> ThemeColors {
        match self {
            Theme::Dark => ThemeColors {
                background: "#161b22",
                border: "#30363d",
                title: "#ffa657",
                text: "#c9d1d9",
                muted: "#616e7f",
                accent: "#a5d6ff",
            },
            Theme::Light => ThemeColors {
                background: "#ffffff",
                border: "#e1e4e8",
                title: "#d73a49",
                text: "#24292f",
                muted: "#6a737d",
                accent: "#0366d6",
            },
        }
    }

    /// Values for the `{{ styles.* }}` tokens.
    pub fn styles(self) -> Vec<(&'static str, String)> {
        let c = self.colors();
        vec![
            ("styles.background", c.background.to_string()),
            ("styles.border", c.border.to_string()),
            ("styles.title", c.title.to_string()),
            ("styles.text", c.text.to_string()),
            ("styles.muted", c.muted.to_string()),
            ("styles.accent", c.accent.to_string()),
        ]
    }
}

/// The three generated images.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Template {
    Overview,
    Languages,
    Community,
}

impl Template {
    pub fn as_str(self) -> &'static str {
        match self {
            Template::Overview => "overview",
            Template::Languages => "languages",
            Template::Community => "community",
        }
    }

    fn builtin(self) -> &'static str {
        match self {
            Template::Overview => include_str!("../templates/overview.svg"),
            Template::Languages => include_str!("../templates/languages.svg"),
            Template::Community => include_str!("../templates/community.svg"),
        }
    }
}

/// Replace `{{ key }}` tokens in one left-to-right pass.
///
/// Unknown tokens are kept verbatim and inserted values are never re-scanned.
pub fn substitute<K, V>(content: &str, data: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut out = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("{{ ") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 3..];
        let Some(end) = after_open.find(" }}") else {
            out.push_str(&rest[start..]);
            return out;
        };

        let key = &after_open[..end];
        match data.iter().find(|(k, _)| k.as_ref() == key) {
            Some((_, value)) => out.push_str(value.as_ref()),
            None => out.push_str(&rest[start..start + 3 + end + 3]),
        }
        rest = &after_open[end + 3..];
    }

    out.push_str(rest);
    out
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// `1234567` -> `"1,234,567"`.
pub fn fmt_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Loads templates and writes one file per theme.
pub struct Renderer {
    template_dir: Option<PathBuf>,
    output_dir: PathBuf,
    image_path: String,
}

impl Renderer {
    pub fn new(template_dir: Option<PathBuf>, output_dir: PathBuf, image_path: String) -> Self {
        Self {
            template_dir,
            output_dir,
            image_path,
        }
    }

    async fn load(&self, template: Template) -> Result<String> {
        match &self.template_dir {
            Some(dir) => {
                let path = dir.join(format!("{}.svg", template.as_str()));
                tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("Failed to read template {}", path.display()))
            }
            None => Ok(template.builtin().to_string()),
        }
    }

    pub fn output_path(&self, template: Template, theme: Theme) -> PathBuf {
        let relative = substitute(
            &self.image_path,
            &[("template", template.as_str()), ("theme", theme.as_str())],
        );
        self.output_dir.join(relative)
    }

    async fn write_themed(&self, template: Template, output: &str) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(Theme::ALL.len());
        for theme in Theme::ALL {
            let path = self.output_path(template, theme);
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                create_dir(parent).await?;
            }
            tokio::fs::write(&path, substitute(output, &theme.styles()))
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), "Generated image");
            written.push(path);
        }
        Ok(written)
    }

    pub async fn generate_overview(&self, stats: &Stats) -> Result<Vec<PathBuf>> {
        let template = self.load(Template::Overview).await?;
        let name = escape_xml(stats.name().await);
        let lines = stats.lines_changed().await;

        let output = substitute(
            &template,
            &[
                ("name", name),
                ("stars", fmt_count(stats.stargazers().await)),
                ("forks", fmt_count(stats.forks().await)),
                ("contributions", fmt_count(stats.total_contributions().await)),
                ("lines_changed", fmt_count(lines.total())),
                ("repos", fmt_count(stats.repos().await.len() as u64)),
            ],
        );
        self.write_themed(Template::Overview, &output).await
    }

    pub async fn generate_languages(&self, stats: &Stats) -> Result<Vec<PathBuf>> {
        let template = self.load(Template::Languages).await?;

        let mut sorted: Vec<_> = stats.languages().await.iter().collect();
        sorted.sort_by(|a, b| b.1.size.cmp(&a.1.size));

        let mut progress = String::new();
        let mut lang_list = String::new();
        for (name, lang) in sorted.into_iter().take(MAX_LANGUAGES) {
            let color = escape_xml(lang.color.as_deref().unwrap_or(DEFAULT_LANGUAGE_COLOR));
            progress.push_str(&format!(
                "<span style=\"background-color: {color}; width: {:.3}%;\"></span>",
                lang.proportion
            ));
            lang_list.push_str(&format!(
                "<li>\n<svg xmlns=\"http://www.w3.org/2000/svg\" class=\"octicon\" style=\"fill:{color};\" viewBox=\"0 0 16 16\" width=\"16\" height=\"16\"><circle xmlns=\"http://www.w3.org/2000/svg\" cx=\"8\" cy=\"9\" r=\"5\" /></svg>\n<span class=\"lang\">{}</span>\n<span class=\"percent\">{:.2}%</span>\n</li>",
                escape_xml(name),
                lang.proportion
            ));
        }

        let output = substitute(
            &template,
            &[("progress", progress), ("lang_list", lang_list)],
        );
        self.write_themed(Template::Languages, &output).await
    }

    pub async fn generate_community(&self, stats: &Stats) -> Result<Vec<PathBuf>> {
        let template = self.load(Template::Community).await?;

        let output = substitute(
            &template,
            &[
                ("joined", escape_xml(stats.joined().await)),
                ("followers", fmt_count(stats.followers().await)),
                ("following", fmt_count(stats.following().await)),
                ("stars", fmt_count(stats.starred_repos().await)),
                ("sponsoring", fmt_count(stats.sponsoring().await)),
            ],
        );
        self.write_themed(Template::Community, &output).await
    }
}

async fn create_dir(dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create output directory {}", dir.display()))
}
