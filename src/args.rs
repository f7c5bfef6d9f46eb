use clap::Parser;
use std::path::PathBuf;

use crate::config::{BackendKind, Config};

#[derive(Parser, Debug)]
pub struct Args {
    /// JSON config file; defaults are used when omitted.
    #[clap(long)]
    pub config: Option<PathBuf>,

    #[clap(long, value_enum)]
    pub backend: Option<BackendKind>,

    #[clap(long)]
    pub background: Option<PathBuf>,

    #[clap(long)]
    pub out: Option<PathBuf>,

    #[clap(long)]
    pub country: Option<String>,

    #[clap(long)]
    pub articles: Option<u32>,

    /// Which of the fetched headlines to turn into a video.
    #[clap(long, default_value_t = 0)]
    pub article: usize,

    /// Leave the scratch directory in place after the run.
    #[clap(long)]
    pub keep_temp: bool,
}

impl Args {
    pub fn apply(&self, cfg: &mut Config) {
        if let Some(backend) = self.backend {
            cfg.tts.backend = backend;
        }
        if let Some(background) = &self.background {
            cfg.assets.background = background.clone();
        }
        if let Some(out) = &self.out {
            cfg.assets.out = out.clone();
        }
        if let Some(country) = &self.country {
            cfg.news.country = country.clone();
        }
        if let Some(articles) = self.articles {
            cfg.news.page_size = articles;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_only_given_fields() {
        let args = Args::parse_from(["newstoon", "--country", "gb", "--articles", "3"]);
        let mut cfg = Config::default();
        args.apply(&mut cfg);
        assert_eq!(cfg.news.country, "gb");
        assert_eq!(cfg.news.page_size, 3);
        assert_eq!(cfg.tts.backend, BackendKind::CloneSite);
        assert_eq!(args.article, 0);
        assert!(!args.keep_temp);
    }

    #[test]
    fn backend_parses_from_kebab_case() {
        let args = Args::parse_from(["newstoon", "--backend", "catalog-site"]);
        assert_eq!(args.backend, Some(BackendKind::CatalogSite));
    }
}
