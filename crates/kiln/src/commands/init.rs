//! Scaffold a starter project.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Starter files, relative to the project root.
const FILES: &[(&str, &str)] = &[
    ("kiln.toml", DEFAULT_CONFIG),
    ("src/templates/_layout.jinja", DEFAULT_LAYOUT),
    ("src/templates/_header.jinja", DEFAULT_HEADER),
    ("src/templates/index.jinja", DEFAULT_INDEX),
    ("src/data/data.json", DEFAULT_DATA),
    ("src/scss/style.scss", DEFAULT_STYLE),
    ("src/scss/_variables.scss", DEFAULT_VARIABLES),
    ("src/js/main.js", DEFAULT_SCRIPT),
];

/// Run the init command.
pub async fn run(yes: bool) -> Result<()> {
    tracing::info!("Initializing kiln project...");

    let written = scaffold(Path::new("."), yes)?;

    if written == 0 {
        tracing::warn!("Project files already exist. Use --yes to overwrite.");
        return Ok(());
    }

    tracing::info!("Initialization complete!");
    tracing::info!("Run 'kiln dev' to start the development server.");

    Ok(())
}

/// Write the starter files under `root`. Existing files are kept unless
/// `overwrite` is set. Returns how many files were written.
pub fn scaffold(root: &Path, overwrite: bool) -> Result<usize> {
    let mut written = 0;

    for (rel, content) in FILES {
        let path = root.join(rel);
        if path.exists() && !overwrite {
            continue;
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&path, content).with_context(|| format!("Failed to write {}", rel))?;
        tracing::info!("Created {}", rel);
        written += 1;
    }

    let images = root.join("src/img");
    if !images.exists() {
        fs::create_dir_all(&images).context("Failed to create src/img")?;
    }

    Ok(written)
}

const DEFAULT_CONFIG: &str = r#"# Kiln Configuration

[paths]
templates = "src/templates"
data = "src/data/data.json"
styles = "src/scss"
scripts = "src/js"
images = "src/img"
output = "dest"

[styles]
# Compress CSS output
minify = true

# Write source maps to css/maps/
source_maps = true

[styles.browsers]
chrome = 90
firefox = 88
safari = 13

[images]
jpeg_quality = 80
webp = true

[server]
port = 3000
open = true
"#;

const DEFAULT_LAYOUT: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{{ title }}</title>
  <link rel="stylesheet" href="/css/style.css">
</head>
<body>
  {% include "_header.jinja" %}
  <main>
    {% block content %}{% endblock %}
  </main>
  <script type="module" src="/js/main.js"></script>
</body>
</html>
"#;

const DEFAULT_HEADER: &str = r#"<header>
  <a href="/">{{ title }}</a>
</header>
"#;

const DEFAULT_INDEX: &str = r#"{% extends "_layout.jinja" %}

{% block content %}
<h1>{{ heading }}</h1>

<ul>
{% for feature in features %}
  <li>{{ feature }}</li>
{% endfor %}
</ul>
{% endblock %}
"#;

const DEFAULT_DATA: &str = r#"{
  "title": "My Site",
  "heading": "Hello from kiln",
  "features": [
    "Jinja templates with shared data",
    "SCSS compiled and minified",
    "Images optimized with WebP copies"
  ]
}
"#;

const DEFAULT_STYLE: &str = r#"@use "variables" as *;

body {
  margin: 0 auto;
  max-width: $content-width;
  font-family: $font-stack;
  color: $text-color;
}

header a {
  color: $accent;
  text-decoration: none;
}
"#;

const DEFAULT_VARIABLES: &str = r#"$font-stack: system-ui, sans-serif;
$text-color: #222;
$accent: #c0392b;
$content-width: 48rem;
"#;

const DEFAULT_SCRIPT: &str = r#"document.documentElement.classList.add("js");
"#;
