use std::fs::File;
use std::io::Write;
use std::path::Path;

use maud::{html, Markup, PreEscaped, DOCTYPE};
use plotly::Plot;

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

/// A titled block of HTML content and plots.
pub struct ReportSection {
    title: String,
    content: Vec<Markup>,
}

impl ReportSection {
    pub fn new(title: &str) -> Self {
        ReportSection {
            title: title.to_string(),
            content: Vec::new(),
        }
    }

    pub fn add_content(&mut self, content: Markup) {
        self.content.push(content);
    }

    pub fn add_plot(&mut self, plot: Plot) {
        let id = format!(
            "plot-{}-{}",
            self.title.to_lowercase().replace(' ', "-"),
            self.content.len()
        );
        self.content.push(PreEscaped(plot.to_inline_html(Some(&id))));
    }

    fn render(&self) -> Markup {
        html! {
            section {
                h2 { (self.title) }
                @for block in &self.content {
                    div class="block" { (block) }
                }
            }
        }
    }
}

/// HTML report; plotly.js is loaded from its CDN when the page is opened.
pub struct Report {
    software: String,
    version: String,
    logo: Option<String>,
    title: String,
    sections: Vec<ReportSection>,
}

impl Report {
    pub fn new(software: &str, version: &str, logo: Option<&str>, title: &str) -> Self {
        Report {
            software: software.to_string(),
            version: version.to_string(),
            logo: logo.map(str::to_string),
            title: title.to_string(),
            sections: Vec::new(),
        }
    }

    pub fn add_section(&mut self, section: ReportSection) {
        self.sections.push(section);
    }

    pub fn render(&self) -> Markup {
        html! {
            (DOCTYPE)
            html lang="en" {
                head {
                    meta charset="utf-8";
                    title { (self.title) }
                    script src=(PLOTLY_CDN) {}
                    style {
                        "body { font-family: sans-serif; margin: 2em auto; max-width: 1100px; }
                         table { border-collapse: collapse; }
                         th, td { border: 1px solid #ccc; padding: 4px 10px; text-align: right; }
                         .block { margin-bottom: 1.5em; }"
                    }
                }
                body {
                    header {
                        @if let Some(logo) = &self.logo {
                            img src=(logo) alt=(self.software) height="60";
                        }
                        h1 { (self.title) }
                        p { (self.software) " v" (self.version) }
                    }
                    @for section in &self.sections {
                        (section.render())
                    }
                }
            }
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = File::create(path)?;
        file.write_all(self.render().into_string().as_bytes())
    }
}
