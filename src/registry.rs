//! Sink and source registry
//!
//! Dangerous-call recognition is data, not code: call-name patterns map to
//! sink categories and taint-source kinds, and the rules consult this
//! registry instead of hardcoding library names. Custom entries can be
//! added without touching the rule engine.

use serde::Serialize;

/// Where externally controlled data enters the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SourceKind {
    RequestParam,
    RequestBody,
    RequestHeader,
    QueryString,
}

impl SourceKind {
    pub fn describe(&self) -> &'static str {
        match self {
            SourceKind::RequestParam => "request path parameter",
            SourceKind::RequestBody => "request body",
            SourceKind::RequestHeader => "request header",
            SourceKind::QueryString => "query string",
        }
    }
}

/// Categories of dangerous operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkKind {
    /// SQL/NoSQL query execution
    QueryExec,
    /// Shell or process execution
    ShellExec,
    /// Filesystem path construction or file access
    PathAccess,
    /// Outbound HTTP fetch
    HttpFetch,
    /// Dynamic code evaluation
    DynamicEval,
    /// Response header mutation
    HeaderSet,
    /// Log emission
    Logging,
}

/// Which argument positions of a sink are sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgPositions {
    /// Only the first argument (query text, URL, code)
    First,
    /// Every argument
    All,
}

/// One dangerous call target: name patterns plus sensitive positions.
#[derive(Debug, Clone)]
pub struct SinkSpec {
    pub kind: SinkKind,
    pub patterns: Vec<String>,
    pub arg_positions: ArgPositions,
}

/// One taint source: member-path or call patterns that yield user data.
#[derive(Debug, Clone)]
pub struct SourceSpec {
    pub kind: SourceKind,
    pub patterns: Vec<String>,
}

/// Registry of sinks, sources, sanitizers, and auth checks.
///
/// Built once per scan, read-only afterwards; shared across worker threads.
#[derive(Debug, Clone)]
pub struct Registry {
    sinks: Vec<SinkSpec>,
    sources: Vec<SourceSpec>,
    sanitizers: Vec<(SinkKind, Vec<String>)>,
    auth_checks: Vec<String>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_default_patterns()
    }
}

impl Registry {
    /// Empty registry, for tests and fully custom setups.
    pub fn empty() -> Self {
        Self {
            sinks: Vec::new(),
            sources: Vec::new(),
            sanitizers: Vec::new(),
            auth_checks: Vec::new(),
        }
    }

    /// Registry pre-populated with the built-in pattern tables.
    pub fn with_default_patterns() -> Self {
        let mut registry = Self::empty();
        registry.add_default_sources();
        registry.add_default_sinks();
        registry.add_default_sanitizers();
        registry.add_default_auth_checks();
        registry
    }

    fn add_default_sources(&mut self) {
        self.add_source(
            SourceKind::RequestBody,
            &["req.body", "request.body", "request.form", "request.json", "c.PostForm", "r.FormValue"],
        );
        self.add_source(
            SourceKind::QueryString,
            &["req.query", "request.query", "request.args", "c.Query", "r.URL.Query"],
        );
        self.add_source(
            SourceKind::RequestParam,
            &["req.params", "request.params", "c.Param", "mux.Vars"],
        );
        self.add_source(
            SourceKind::RequestHeader,
            &["req.headers", "request.headers", "req.get", "c.GetHeader", "r.Header.Get", "req.cookies"],
        );
    }

    fn add_default_sinks(&mut self) {
        self.add_sink(
            SinkKind::QueryExec,
            ArgPositions::First,
            &[
                "pool.query", "client.query", "connection.query", "db.query", "db.execute",
                "cursor.execute", "sequelize.query", "knex.raw",
                "db.Query", "db.QueryRow", "db.Exec", "tx.Query", "tx.Exec",
            ],
        );
        self.add_sink(
            SinkKind::ShellExec,
            ArgPositions::All,
            &[
                "exec", "execSync", "spawn", "spawnSync",
                "child_process.exec", "child_process.execSync", "child_process.spawn",
                "os.system", "subprocess.run", "subprocess.call", "exec.Command",
            ],
        );
        self.add_sink(
            SinkKind::PathAccess,
            ArgPositions::All,
            &[
                "path.join", "path.resolve",
                "fs.readFile", "fs.readFileSync", "fs.writeFile", "fs.writeFileSync",
                "fs.createReadStream", "res.download", "res.sendFile", "send_file",
                "os.Open", "ioutil.ReadFile", "filepath.Join",
            ],
        );
        self.add_sink(
            SinkKind::HttpFetch,
            ArgPositions::First,
            &[
                "fetch", "axios.get", "axios.post", "axios.put", "axios.delete", "axios.request",
                "http.get", "https.get", "got", "request",
                "requests.get", "requests.post", "urllib.request.urlopen", "http.Get",
            ],
        );
        self.add_sink(
            SinkKind::DynamicEval,
            ArgPositions::All,
            &["eval", "Function", "vm.runInNewContext", "vm.runInThisContext", "vm.runInContext"],
        );
        self.add_sink(
            SinkKind::HeaderSet,
            ArgPositions::All,
            &["res.header", "res.setHeader", "res.set", "response.set_header"],
        );
        self.add_sink(
            SinkKind::Logging,
            ArgPositions::All,
            &[
                "console.log", "console.error", "console.warn", "console.info",
                "logger.info", "logger.debug", "logger.warn", "logger.error",
                "log.info", "log.debug", "log.warn", "log.error",
                "log.Printf", "log.Println", "log.Print",
            ],
        );
    }

    fn add_default_sanitizers(&mut self) {
        self.add_sanitizers(
            SinkKind::PathAccess,
            &["basename", "path.basename", "filepath.Base", "normalize", "secure_filename", "sanitizePath", "sanitize_path", "resolveWithin"],
        );
        self.add_sanitizers(
            SinkKind::HttpFetch,
            &["isSafeUrl", "is_safe_url", "validateUrl", "validate_url", "checkHost", "check_host", "allowlist", "whitelist", "isAllowedHost"],
        );
        self.add_sanitizers(
            SinkKind::QueryExec,
            &["escape", "parameterize", "mogrify"],
        );
        self.add_sanitizers(
            SinkKind::ShellExec,
            &["shlex.quote", "escapeshellarg", "shellQuote", "shell_quote"],
        );
    }

    fn add_default_auth_checks(&mut self) {
        for pattern in [
            "authenticate", "authorize", "requireAuth", "require_auth", "ensureAuth",
            "isAuthenticated", "is_authenticated", "verifyToken", "verify_token",
            "checkAuth", "check_auth", "checkPermission", "check_permission",
            "hasPermission", "has_permission", "requireRole", "jwt.verify",
            "passport.authenticate",
        ] {
            self.auth_checks.push(pattern.to_string());
        }
    }

    // ------------------------------------------------------------------
    // Extension points
    // ------------------------------------------------------------------

    pub fn add_sink(&mut self, kind: SinkKind, arg_positions: ArgPositions, patterns: &[&str]) {
        self.sinks.push(SinkSpec {
            kind,
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            arg_positions,
        });
    }

    pub fn add_source(&mut self, kind: SourceKind, patterns: &[&str]) {
        self.sources.push(SourceSpec {
            kind,
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
        });
    }

    pub fn add_sanitizers(&mut self, kind: SinkKind, patterns: &[&str]) {
        self.sanitizers
            .push((kind, patterns.iter().map(|p| p.to_string()).collect()));
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    /// Match a call target path against the sink tables.
    pub fn sink_for(&self, callee: &str) -> Option<&SinkSpec> {
        self.sinks.iter().find(|spec| {
            spec.patterns
                .iter()
                .any(|p| pattern_matches(callee, p))
        })
    }

    /// Match a member path (`req.body.username`) against the source tables.
    /// Prefix matching: `req.body` also matches `req.body.username`.
    pub fn source_for(&self, path: &str) -> Option<SourceKind> {
        for spec in &self.sources {
            for pattern in &spec.patterns {
                if path == pattern || path.starts_with(&format!("{pattern}.")) {
                    return Some(spec.kind);
                }
            }
        }
        None
    }

    /// Whether a call target neutralizes taint for the given sink kind.
    pub fn is_sanitizer(&self, kind: SinkKind, callee: &str) -> bool {
        self.sanitizers.iter().any(|(k, patterns)| {
            *k == kind && patterns.iter().any(|p| pattern_matches(callee, p))
        })
    }

    /// Whether a call target looks like an auth/permission check.
    pub fn is_auth_check(&self, callee: &str) -> bool {
        self.auth_checks.iter().any(|p| pattern_matches(callee, p))
    }
}

/// Word-boundary match for call/function names.
///
/// Dotted patterns (like `pool.query`) must match a suffix of the dotted
/// path so `db.pool.query` still hits; bare names must match a whole path
/// segment so `exec` does not match `execute`.
pub fn pattern_matches(callee: &str, pattern: &str) -> bool {
    if pattern.contains('.') {
        return callee == pattern || callee.ends_with(&format!(".{pattern}"));
    }
    callee
        .rsplit('.')
        .next()
        .map(|last| last == pattern)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_lookup() {
        let registry = Registry::with_default_patterns();
        assert_eq!(
            registry.sink_for("pool.query").map(|s| s.kind),
            Some(SinkKind::QueryExec)
        );
        assert_eq!(
            registry.sink_for("exec").map(|s| s.kind),
            Some(SinkKind::ShellExec)
        );
        assert_eq!(
            registry.sink_for("axios.get").map(|s| s.kind),
            Some(SinkKind::HttpFetch)
        );
        assert!(registry.sink_for("render").is_none());
    }

    #[test]
    fn test_bare_pattern_needs_whole_segment() {
        // `execute` must not match the bare `exec` pattern
        let registry = Registry::with_default_patterns();
        assert!(registry.sink_for("execute").is_none());
        // but a qualified tail still matches dotted patterns
        assert_eq!(
            registry.sink_for("app.db.pool.query").map(|s| s.kind),
            Some(SinkKind::QueryExec)
        );
    }

    #[test]
    fn test_source_prefix_match() {
        let registry = Registry::with_default_patterns();
        assert_eq!(
            registry.source_for("req.body"),
            Some(SourceKind::RequestBody)
        );
        assert_eq!(
            registry.source_for("req.body.username"),
            Some(SourceKind::RequestBody)
        );
        assert_eq!(
            registry.source_for("req.query.url"),
            Some(SourceKind::QueryString)
        );
        // `req.bodyguard` must not match `req.body`
        assert_eq!(registry.source_for("req.bodyguard"), None);
    }

    #[test]
    fn test_sanitizer_and_auth_lookup() {
        let registry = Registry::with_default_patterns();
        assert!(registry.is_sanitizer(SinkKind::PathAccess, "path.basename"));
        assert!(registry.is_sanitizer(SinkKind::HttpFetch, "isSafeUrl"));
        assert!(!registry.is_sanitizer(SinkKind::QueryExec, "basename"));
        assert!(registry.is_auth_check("requireAuth"));
        assert!(registry.is_auth_check("passport.authenticate"));
        assert!(!registry.is_auth_check("getUser"));
    }

    #[test]
    fn test_custom_registration() {
        let mut registry = Registry::empty();
        registry.add_sink(SinkKind::QueryExec, ArgPositions::First, &["orm.rawSql"]);
        registry.add_source(SourceKind::RequestBody, &["ctx.payload"]);
        assert!(registry.sink_for("orm.rawSql").is_some());
        assert_eq!(
            registry.source_for("ctx.payload.name"),
            Some(SourceKind::RequestBody)
        );
    }
}
