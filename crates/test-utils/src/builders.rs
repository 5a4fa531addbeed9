#![allow(dead_code)]

use std::collections::BTreeMap;

use harbormaster::config::{Project, ProxyRule};

/// Builder for `Project` to simplify test setup.
pub struct ProjectBuilder {
    project: Project,
}

impl ProjectBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            project: Project {
                name: name.to_string(),
                repo: format!("https://git.example.invalid/{name}.git"),
                install: None,
                build: None,
                start: "run-server".to_string(),
                env: BTreeMap::new(),
                proxy: None,
            },
        }
    }

    pub fn repo(mut self, repo: &str) -> Self {
        self.project.repo = repo.to_string();
        self
    }

    pub fn install(mut self, cmd: &str) -> Self {
        self.project.install = Some(cmd.to_string());
        self
    }

    pub fn build_cmd(mut self, cmd: &str) -> Self {
        self.project.build = Some(cmd.to_string());
        self
    }

    pub fn start(mut self, cmd: &str) -> Self {
        self.project.start = cmd.to_string();
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.project.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn proxy(mut self, from_host: &str, to_port: u16) -> Self {
        self.project.proxy = Some(ProxyRule {
            from_host: from_host.to_string(),
            to_port,
        });
        self
    }

    pub fn build(self) -> Project {
        self.project
    }
}
