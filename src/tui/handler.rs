use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Screen {
    #[default]
    Feed,
    Topics,
    Settings,
}

impl Screen {
    pub const ALL: [Screen; 3] = [Screen::Feed, Screen::Topics, Screen::Settings];

    pub fn next(self) -> Self {
        match self {
            Self::Feed => Self::Topics,
            Self::Topics => Self::Settings,
            Self::Settings => Self::Feed,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Feed => "Feed",
            Self::Topics => "Topics",
            Self::Settings => "Settings",
        }
    }

    pub fn index(self) -> usize {
        match self {
            Self::Feed => 0,
            Self::Topics => 1,
            Self::Settings => 2,
        }
    }
}

/// What the keyboard is currently driving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyContext {
    Help,
    Confirm,
    TextInput,
    Normal(Screen),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppAction {
    Quit,
    NextScreen,
    ShowScreen(Screen),
    MoveUp,
    MoveDown,
    ShowHelp,
    HideHelp,
    // Feed
    RefreshFeed,
    OpenArticle,
    ToggleRead,
    CycleFilter,
    // Topics
    AddTopic,
    EditTopic,
    DeleteTopic,
    ToggleTopicActive,
    ToggleTopicNotifications,
    // Settings
    ToggleNotifications,
    CycleFrequency,
    ToggleQuietHours,
    EditQuietStart,
    EditQuietEnd,
    EditApiKey,
    SaveSettings,
    ClearData,
    // Text input (topic form and setting editors)
    InputChar(char),
    InputBackspace,
    InputNextField,
    InputConfirm,
    InputCancel,
    // Yes/no prompts
    ConfirmYes,
    ConfirmNo,
}

pub fn handle_key_event(key: KeyEvent, context: KeyContext) -> Option<AppAction> {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Some(AppAction::Quit);
    }

    match context {
        // If help is showing, any key closes it
        KeyContext::Help => Some(AppAction::HideHelp),

        KeyContext::Confirm => match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => Some(AppAction::ConfirmYes),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => Some(AppAction::ConfirmNo),
            _ => None,
        },

        KeyContext::TextInput => match key.code {
            KeyCode::Enter => Some(AppAction::InputConfirm),
            KeyCode::Esc => Some(AppAction::InputCancel),
            KeyCode::Tab | KeyCode::BackTab => Some(AppAction::InputNextField),
            KeyCode::Backspace => Some(AppAction::InputBackspace),
            KeyCode::Char(c) => Some(AppAction::InputChar(c)),
            _ => None,
        },

        KeyContext::Normal(screen) => {
            let global = match key.code {
                KeyCode::Char('q') => Some(AppAction::Quit),
                KeyCode::Tab => Some(AppAction::NextScreen),
                KeyCode::Char('1') => Some(AppAction::ShowScreen(Screen::Feed)),
                KeyCode::Char('2') => Some(AppAction::ShowScreen(Screen::Topics)),
                KeyCode::Char('3') => Some(AppAction::ShowScreen(Screen::Settings)),
                KeyCode::Char('?') => Some(AppAction::ShowHelp),
                KeyCode::Char('j') | KeyCode::Down => Some(AppAction::MoveDown),
                KeyCode::Char('k') | KeyCode::Up => Some(AppAction::MoveUp),
                _ => None,
            };
            if global.is_some() {
                return global;
            }

            match screen {
                Screen::Feed => match key.code {
                    KeyCode::Char('r') => Some(AppAction::RefreshFeed),
                    KeyCode::Enter | KeyCode::Char('o') => Some(AppAction::OpenArticle),
                    KeyCode::Char('m') => Some(AppAction::ToggleRead),
                    KeyCode::Char('f') => Some(AppAction::CycleFilter),
                    _ => None,
                },
                Screen::Topics => match key.code {
                    KeyCode::Char('a') => Some(AppAction::AddTopic),
                    KeyCode::Char('e') | KeyCode::Enter => Some(AppAction::EditTopic),
                    KeyCode::Char('d') => Some(AppAction::DeleteTopic),
                    KeyCode::Char(' ') => Some(AppAction::ToggleTopicActive),
                    KeyCode::Char('n') => Some(AppAction::ToggleTopicNotifications),
                    _ => None,
                },
                Screen::Settings => match key.code {
                    KeyCode::Char('n') => Some(AppAction::ToggleNotifications),
                    KeyCode::Char('f') => Some(AppAction::CycleFrequency),
                    KeyCode::Char('h') => Some(AppAction::ToggleQuietHours),
                    KeyCode::Char('b') => Some(AppAction::EditQuietStart),
                    KeyCode::Char('e') => Some(AppAction::EditQuietEnd),
                    KeyCode::Char('K') => Some(AppAction::EditApiKey),
                    KeyCode::Char('s') => Some(AppAction::SaveSettings),
                    KeyCode::Char('X') => Some(AppAction::ClearData),
                    _ => None,
                },
            }
        }
    }
}
