pub struct Dirs {
    project_dirs: Option<directories::ProjectDirs>,
}

impl Dirs {
    pub fn new() -> Self {
        // None when there's no home directory to hang a config dir off of
        Self {
            project_dirs: directories::ProjectDirs::from("", "", "termbridge"),
        }
    }

    fn config_dir(&self) -> Option<&std::path::Path> {
        self.project_dirs
            .as_ref()
            .map(directories::ProjectDirs::config_dir)
    }

    pub fn config_file(
        &self,
        name: &str,
        must_exist: bool,
    ) -> Option<std::path::PathBuf> {
        let file = self.config_dir()?.join(name);
        if must_exist && !file.exists() {
            return None;
        }
        Some(file)
    }
}
