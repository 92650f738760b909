use tui_textarea::TextArea;

/// What the text input is currently collecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// A chat message (chat screen).
    Message,
    /// A file or directory path to attach (chat screen).
    ContextPath,
    /// A model name to pull (models screen).
    PullName,
}

pub struct UiState {
    pub selected_model: usize,
    pub input_mode: InputMode,
    pub status: Option<String>,
    pub models_loading: bool,
    pub exit_requested: bool,
    textarea: TextArea<'static>,
}

impl Default for UiState {
    fn default() -> Self {
        Self::new()
    }
}

impl UiState {
    pub fn new() -> Self {
        Self {
            selected_model: 0,
            input_mode: InputMode::Message,
            status: None,
            models_loading: false,
            exit_requested: false,
            textarea: TextArea::default(),
        }
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = Some(status.into());
    }

    pub fn clear_status(&mut self) {
        self.status = None;
    }

    pub fn textarea(&self) -> &TextArea<'static> {
        &self.textarea
    }

    pub fn apply_textarea_edit<F>(&mut self, f: F)
    where
        F: FnOnce(&mut TextArea<'static>),
    {
        f(&mut self.textarea);
    }

    pub fn input_text(&self) -> String {
        self.textarea.lines().join("\n")
    }

    /// Return the current input and reset the text area.
    pub fn take_input(&mut self) -> String {
        let text = self.input_text();
        self.clear_input();
        text
    }

    pub fn clear_input(&mut self) {
        self.textarea = TextArea::default();
    }

    pub fn set_input_mode(&mut self, mode: InputMode) {
        if self.input_mode != mode {
            self.input_mode = mode;
            self.clear_input();
        }
    }

    /// Move the model cursor by `delta`, wrapping at both ends.
    pub fn move_selection(&mut self, delta: isize, len: usize) {
        if len == 0 {
            self.selected_model = 0;
            return;
        }
        let len = len as isize;
        let current = (self.selected_model as isize).min(len - 1);
        self.selected_model = (current + delta).rem_euclid(len) as usize;
    }

    pub fn clamp_selection(&mut self, len: usize) {
        if len == 0 {
            self.selected_model = 0;
        } else if self.selected_model >= len {
            self.selected_model = len - 1;
        }
    }
}
