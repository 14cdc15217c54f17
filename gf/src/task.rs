//! A single AI generation task
//!
//! A task reads some inputs and prompt files, asks a chat collaborator to
//! produce the output, and writes it with a version marker recording the
//! input versions. Since AI calls are slow, paid and have to be reviewed by
//! a human, the whole design is built around not running them: before
//! executing, the recorded versions are compared with the current ones and
//! an up to date output is left alone.
//!
//! Input contents are handed to the AI as faked assistant messages ("put it
//! into the AI's mouth"): for each input there is a user message asking to
//! retrieve the file and an assistant message containing it, followed by the
//! actual prompt as the last user message.

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::chat::{ChatClient, ChatRequest};
use crate::error::{GenError, Result};
use crate::fingerprint::fingerprint;
use crate::inout::InOut;
use crate::marker::{VersionMarker, input_version, unclutter};
use crate::regencheck::RegenerationCheckStrategy;
use crate::writing::WritingStrategy;

/// Marker the AI is instructed to insert when the task description is
/// contradictory or unclear. An answer containing it aborts the pipeline so
/// the user sees the problem.
pub const FIXME: &str = "FIXME";

/// System message used when none is configured.
pub const DEFAULT_SYSTEM_MESSAGE: &str = "\
You are a precise file generation engine. You will be given the contents of \
input files and then a task description. Generate exactly the content of the \
requested output file from the given inputs, and output only that content, \
without any additional remarks, explanations or surrounding quotes. If the \
task description is contradictory or cannot be fulfilled from the given \
inputs, insert a line containing FIXME and a short description of the \
problem into the output.\n";

/// One generation step: inputs and prompts in, one written output out.
#[derive(Clone, Debug)]
pub struct GenerationTask {
    inputs: Vec<InOut>,
    output: Option<InOut>,
    prompt: Option<String>,
    prompt_inputs: Vec<InOut>,
    placeholders: Vec<(String, String)>,
    system_message: Option<String>,
    system_message_input: Option<InOut>,
    force: bool,
    max_tokens: Option<u32>,
    writing: WritingStrategy,
    regeneration_check: RegenerationCheckStrategy,
}

impl Default for GenerationTask {
    fn default() -> Self {
        GenerationTask::new()
    }
}

impl GenerationTask {
    pub fn new() -> Self {
        GenerationTask {
            inputs: Vec::new(),
            output: None,
            prompt: None,
            prompt_inputs: Vec::new(),
            placeholders: Vec::new(),
            system_message: None,
            system_message_input: None,
            force: false,
            max_tokens: None,
            writing: WritingStrategy::WithVersion,
            regeneration_check: RegenerationCheckStrategy::VersionMarker,
        }
    }

    /// Adds an input. The input has to exist, otherwise the pipeline is
    /// misconfigured.
    pub fn add_input(&mut self, input: InOut) -> Result<&mut Self> {
        if !input.exists() && !matches!(input, InOut::Stdin) {
            return Err(GenError::MissingInput {
                path: input.path().unwrap_or_else(|| "-".as_ref()).to_owned(),
            });
        }
        self.inputs.push(input);
        Ok(self)
    }

    /// Adds an input that may be missing, e.g. the output of a previous run.
    pub fn add_optional_input(&mut self, input: InOut) -> &mut Self {
        if input.exists() {
            self.inputs.push(input);
        } else {
            debug!(input = %input, "optional input not there");
        }
        self
    }

    pub fn set_output(&mut self, output: InOut) -> &mut Self {
        self.output = Some(output);
        self
    }

    /// Reads a prompt, substitutes `${key}` placeholders and appends it to
    /// the task's prompt. Several prompts are joined with blank lines.
    pub fn add_prompt(&mut self, prompt_input: InOut, placeholders: &[(String, String)]) -> Result<&mut Self> {
        let content = prompt_input.read()?;
        let mut new_prompt = unclutter(&content);
        for (key, value) in placeholders {
            new_prompt = new_prompt.replace(&format!("${{{key}}}"), value);
        }
        match &mut self.prompt {
            Some(prompt) => {
                prompt.push_str("\n\n");
                prompt.push_str(&new_prompt);
            }
            None => self.prompt = Some(new_prompt),
        }
        self.prompt_inputs.push(prompt_input);
        for (key, value) in placeholders {
            match self.placeholders.iter_mut().find(|(k, _)| k == key) {
                Some(entry) => entry.1 = value.clone(),
                None => self.placeholders.push((key.clone(), value.clone())),
            }
        }
        Ok(self)
    }

    pub fn set_system_message(&mut self, input: InOut) -> Result<&mut Self> {
        let content = input.read()?;
        self.system_message = Some(unclutter(&content));
        self.system_message_input = Some(input);
        Ok(self)
    }

    /// Run even when the output is up to date.
    pub fn force(&mut self, force: bool) -> &mut Self {
        self.force = force;
        self
    }

    pub fn max_tokens(&mut self, max_tokens: u32) -> &mut Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn writing_strategy(&mut self, writing: WritingStrategy) -> &mut Self {
        self.writing = writing;
        self
    }

    pub fn regeneration_check(&mut self, strategy: RegenerationCheckStrategy) -> &mut Self {
        self.regeneration_check = strategy;
        self
    }

    pub fn output(&self) -> Option<&InOut> {
        self.output.as_ref()
    }

    pub fn inputs(&self) -> &[InOut] {
        &self.inputs
    }

    pub fn prompt_inputs(&self) -> &[InOut] {
        &self.prompt_inputs
    }

    fn output_ref(&self) -> Result<&InOut> {
        self.output.as_ref().ok_or(GenError::NoOutput)
    }

    /// The `label-version` entries that would be recorded in the output's
    /// version marker if the task ran now.
    pub fn input_version_markers(&self) -> Result<Vec<String>> {
        let output = self.output_ref()?;
        let mut markers = Vec::new();
        if let Some(input) = &self.system_message_input {
            markers.push(versioned_label(input)?);
        }
        // The output never counts as its own input, so updating an existing
        // file does not create a circular version dependency.
        for input in self.prompt_inputs.iter().chain(&self.inputs) {
            if !input.same_unit(output) {
                markers.push(versioned_label(input)?);
            }
        }
        if !self.placeholders.is_empty() {
            let rendered = self
                .placeholders
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(", ");
            markers.push(format!("parms-{}", fingerprint(&format!("{{{rendered}}}"))));
        }
        Ok(markers)
    }

    /// Whether the output has to be (re)generated.
    pub fn needs_regeneration(&self) -> Result<bool> {
        let output = self.output_ref()?;
        let current = self.input_version_markers()?;
        self.regeneration_check
            .needs_regeneration(output, &self.inputs, &self.writing, &current)
    }

    /// Executes the task if necessary. Returns whether the AI was actually
    /// called and the output written.
    pub fn execute(&self, chat: &dyn ChatClient, root: &Path) -> Result<bool> {
        let output = self.output_ref()?;
        let rel = display_path(output, root);
        if !self.force && !self.needs_regeneration()? {
            info!(output = %rel, "up to date, skipping");
            return Ok(false);
        }
        let request = self.build_request(root)?;
        let result = chat.execute(&request)?;
        debug!(output = %rel, "chat result:\n{result}");
        let own_version = fingerprint(&result);
        let marker = VersionMarker::new(own_version, self.input_version_markers()?);
        self.writing.write(output, &result, &marker.to_text())?;
        info!(output = %rel, "wrote output");
        // Checked after writing, the written file is easier to inspect.
        if result.contains(FIXME) {
            return Err(GenError::FixmeReturned {
                path: output.path().unwrap_or_else(|| "-".as_ref()).to_owned(),
                output: result,
            });
        }
        Ok(true)
    }

    /// The request body that would be sent to the AI, for debugging.
    pub fn serialize(&self, chat: &dyn ChatClient, root: &Path) -> Result<String> {
        let request = self.build_request(root)?;
        Ok(chat.serialize(&request)?)
    }

    /// Asks the AI a question about a previous run: recreates the
    /// conversation, appends the previously generated output and the
    /// question. The answer is returned, nothing is written.
    pub fn explain(&self, chat: &dyn ChatClient, root: &Path, question: &str) -> Result<String> {
        let output = self.output_ref()?;
        if self.needs_regeneration()? {
            // Not strictly necessary, but almost certainly a mistake.
            return Err(GenError::NotYetRun {
                path: output.path().unwrap_or_else(|| "-".as_ref()).to_owned(),
            });
        }
        let mut request = self.build_request(root)?;
        let previous = unclutter(&output.read()?);
        request.assistant_msg(&previous);
        request.user_msg(question);
        let result = chat.execute(&request)?;
        if result.contains(FIXME) {
            return Err(GenError::FixmeReturned {
                path: output.path().unwrap_or_else(|| "-".as_ref()).to_owned(),
                output: result,
            });
        }
        Ok(result)
    }

    /// Builds the chat conversation: system message, the inputs as faked
    /// retrieval exchanges, the prompt last.
    pub fn build_request(&self, root: &Path) -> Result<ChatRequest> {
        let output = self.output_ref()?;
        if let Some(parent) = output.path().and_then(Path::parent) {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                fs::create_dir_all(parent).map_err(|source| GenError::Write {
                    path: parent.to_owned(),
                    source,
                })?;
            }
        }
        let prompt = match &self.prompt {
            Some(prompt) if !prompt.trim().is_empty() => prompt,
            _ => {
                return Err(GenError::NoPrompt {
                    path: output.path().unwrap_or_else(|| "-".as_ref()).to_owned(),
                });
            }
        };
        let mut request = ChatRequest::new();
        if let Some(max_tokens) = self.max_tokens {
            request.max_tokens(max_tokens);
        }
        match &self.system_message {
            Some(message) if !message.trim().is_empty() => request.system_msg(message),
            _ => request.system_msg(DEFAULT_SYSTEM_MESSAGE),
        };
        for input in &self.inputs {
            let rel = display_path(input, root);
            request.user_msg(&format!("Retrieve the content of the input file {rel}"));
            request.assistant_msg(&unclutter(&input.read()?));
        }
        request.user_msg(prompt);
        Ok(request)
    }
}

fn versioned_label(input: &InOut) -> Result<String> {
    let content = input.read()?;
    Ok(format!("{}-{}", input.label(), input_version(&content)))
}

/// The path relative to `root` where possible, for logs and chat messages.
fn display_path(io: &InOut, root: &Path) -> String {
    let Some(canonical) = io.canonical() else {
        return io.label();
    };
    let root = crate::inout::canonical_or_absolute(root);
    match canonical.strip_prefix(&root) {
        Ok(rel) => rel.display().to_string(),
        Err(_) => io.path().map(|p| p.display().to_string()).unwrap_or_else(|| io.label()),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use tempfile::TempDir;

    use super::*;
    use crate::chat::mock::MockChat;
    use crate::chat::Role;

    fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn basic_task(dir: &TempDir) -> GenerationTask {
        let input = write_file(dir, "in.txt", "hello\n");
        let prompt = write_file(dir, "prompt.txt", "Uppercase the input.\n");
        let mut task = GenerationTask::new();
        task.add_input(InOut::file(input)).unwrap();
        task.add_prompt(InOut::file(prompt), &[]).unwrap();
        task.set_output(InOut::file(dir.path().join("out.txt")));
        task
    }

    #[test]
    fn missing_input_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut task = GenerationTask::new();
        let err = task
            .add_input(InOut::file(dir.path().join("absent.txt")))
            .unwrap_err();
        assert!(matches!(err, GenError::MissingInput { .. }));
    }

    #[test]
    fn request_puts_inputs_into_the_ais_mouth() {
        let dir = TempDir::new().unwrap();
        let task = basic_task(&dir);
        let request = task.build_request(dir.path()).unwrap();
        let roles: Vec<Role> = request.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
        assert_eq!(
            request.messages[1].content,
            "Retrieve the content of the input file in.txt"
        );
        assert_eq!(request.messages[2].content, "hello\n");
        assert_eq!(request.messages[3].content, "Uppercase the input.\n");
    }

    #[test]
    fn execute_writes_output_with_marker_and_then_skips() {
        let dir = TempDir::new().unwrap();
        let task = basic_task(&dir);
        let chat = MockChat::new(vec!["HELLO\n".to_owned()]);
        assert!(task.execute(&chat, dir.path()).unwrap());
        let written = fs::read_to_string(dir.path().join("out.txt")).unwrap();
        assert!(written.starts_with("// AIGenVersion("));
        assert!(written.contains("HELLO\n"));
        assert!(written.contains("in.txt-"));
        assert!(written.contains("prompt.txt-"));
        // second run: up to date, the chat is not called again
        assert!(!task.execute(&chat, dir.path()).unwrap());
        assert_eq!(chat.requests.borrow().len(), 1);
    }

    #[test]
    fn editing_an_input_triggers_regeneration() {
        let dir = TempDir::new().unwrap();
        let task = basic_task(&dir);
        let chat = MockChat::new(vec!["HELLO\n".to_owned(), "GOODBYE\n".to_owned()]);
        assert!(task.execute(&chat, dir.path()).unwrap());
        assert!(!task.needs_regeneration().unwrap());
        fs::write(dir.path().join("in.txt"), "goodbye\n").unwrap();
        assert!(task.needs_regeneration().unwrap());
        assert!(task.execute(&chat, dir.path()).unwrap());
        assert!(
            fs::read_to_string(dir.path().join("out.txt"))
                .unwrap()
                .contains("GOODBYE")
        );
    }

    #[test]
    fn whitespace_only_input_edits_do_not_trigger_regeneration() {
        let dir = TempDir::new().unwrap();
        let task = basic_task(&dir);
        let chat = MockChat::new(vec!["HELLO\n".to_owned()]);
        task.execute(&chat, dir.path()).unwrap();
        fs::write(dir.path().join("in.txt"), "hello  \n \n").unwrap();
        assert!(!task.needs_regeneration().unwrap());
    }

    #[test]
    fn pinned_input_version_shields_downstream() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "in.txt", "// AIGenVersion(pinned1)\nhello\n");
        let prompt = write_file(&dir, "prompt.txt", "Uppercase.\n");
        let mut task = GenerationTask::new();
        task.add_input(InOut::file(dir.path().join("in.txt"))).unwrap();
        task.add_prompt(InOut::file(prompt), &[]).unwrap();
        task.set_output(InOut::file(dir.path().join("out.txt")));
        let chat = MockChat::new(vec!["HELLO\n".to_owned()]);
        task.execute(&chat, dir.path()).unwrap();
        // content changes, recorded version stays pinned
        fs::write(
            dir.path().join("in.txt"),
            "// AIGenVersion(pinned1)\nhello with substantial edits\n",
        )
        .unwrap();
        assert!(!task.needs_regeneration().unwrap());
        // bumping the pinned version triggers regeneration
        fs::write(
            dir.path().join("in.txt"),
            "// AIGenVersion(pinned2)\nhello with substantial edits\n",
        )
        .unwrap();
        assert!(task.needs_regeneration().unwrap());
    }

    #[test]
    fn placeholders_are_substituted_and_versioned() {
        let dir = TempDir::new().unwrap();
        let prompt = write_file(&dir, "prompt.txt", "Generate a ${kind} greeting.\n");
        let mut task = GenerationTask::new();
        task.add_prompt(
            InOut::file(&prompt),
            &[("kind".to_owned(), "formal".to_owned())],
        )
        .unwrap();
        task.set_output(InOut::file(dir.path().join("out.txt")));
        let request = task.build_request(dir.path()).unwrap();
        assert!(
            request
                .messages
                .last()
                .unwrap()
                .content
                .contains("a formal greeting")
        );
        let markers = task.input_version_markers().unwrap();
        assert!(markers.iter().any(|m| m.starts_with("parms-")));
        // a changed value changes the parms version
        let mut other = GenerationTask::new();
        other
            .add_prompt(
                InOut::file(&prompt),
                &[("kind".to_owned(), "casual".to_owned())],
            )
            .unwrap();
        other.set_output(InOut::file(dir.path().join("out.txt")));
        assert_ne!(markers, other.input_version_markers().unwrap());
    }

    #[test]
    fn fixme_in_the_answer_aborts_after_writing() {
        let dir = TempDir::new().unwrap();
        let task = basic_task(&dir);
        let chat = MockChat::new(vec!["FIXME: inputs contradictory\n".to_owned()]);
        let err = task.execute(&chat, dir.path()).unwrap_err();
        assert!(matches!(err, GenError::FixmeReturned { .. }));
        // the output was still written so the user can inspect it
        assert!(dir.path().join("out.txt").exists());
    }

    #[test]
    fn missing_prompt_is_an_error() {
        let dir = TempDir::new().unwrap();
        let input = write_file(&dir, "in.txt", "hello\n");
        let mut task = GenerationTask::new();
        task.add_input(InOut::file(input)).unwrap();
        task.set_output(InOut::file(dir.path().join("out.txt")));
        assert!(matches!(
            task.build_request(dir.path()).unwrap_err(),
            GenError::NoPrompt { .. }
        ));
    }

    #[test]
    fn output_as_input_does_not_create_a_version_cycle() {
        let dir = TempDir::new().unwrap();
        let chat = MockChat::new(vec!["HELLO\n".to_owned()]);
        basic_task(&dir).execute(&chat, dir.path()).unwrap();
        let mut task = basic_task(&dir);
        task.add_optional_input(InOut::file(dir.path().join("out.txt")));
        assert_eq!(task.inputs().len(), 2);
        let markers = task.input_version_markers().unwrap();
        assert!(!markers.iter().any(|m| m.starts_with("out.txt-")));
        assert!(!task.needs_regeneration().unwrap());
    }

    #[test]
    fn explain_requires_a_previous_run() {
        let dir = TempDir::new().unwrap();
        let task = basic_task(&dir);
        let chat = MockChat::new(vec![]);
        assert!(matches!(
            task.explain(&chat, dir.path(), "why?").unwrap_err(),
            GenError::NotYetRun { .. }
        ));
    }

    #[test]
    fn explain_appends_previous_output_and_question() {
        let dir = TempDir::new().unwrap();
        let task = basic_task(&dir);
        let chat = MockChat::new(vec!["HELLO\n".to_owned(), "Because you asked.".to_owned()]);
        task.execute(&chat, dir.path()).unwrap();
        let answer = task.explain(&chat, dir.path(), "Why uppercase?").unwrap();
        assert_eq!(answer, "Because you asked.");
        let requests = chat.requests.borrow();
        let last = &requests[1].messages;
        assert_eq!(last.last().unwrap().content, "Why uppercase?");
        assert_eq!(last[last.len() - 2].role, Role::Assistant);
        assert!(last[last.len() - 2].content.contains("HELLO"));
    }

    #[test]
    fn in_file_region_keeps_prompt_as_dependency() {
        let dir = TempDir::new().unwrap();
        let content = "\
// AIGenPromptStart(x)
Say hello.
// AIGenCommand(x)
// AIGenPromptEnd(x)
// AIGenEnd(x)
";
        let path = write_file(&dir, "f.txt", content);
        let seps = crate::segmented::infile_prompting("x");
        let seps: Vec<&str> = seps.iter().map(String::as_str).collect();
        let file = crate::segmented::SegmentedFile::new(&path, &seps)
            .unwrap()
            .shared();
        let prompt = InOut::segment(std::rc::Rc::clone(&file), 1);
        let output = InOut::segment(file, 3);
        let mut task = GenerationTask::new();
        task.add_prompt(prompt, &[]).unwrap();
        task.set_output(output);
        // the prompt segment lives in the output file but is a different
        // unit, so it stays in the recorded versions
        let markers = task.input_version_markers().unwrap();
        assert_eq!(markers.len(), 1);
        assert!(markers[0].starts_with("f.txt-"));
    }
}
