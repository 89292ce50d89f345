// src/cli/state.rs
use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::widgets::{ListState, TableState};
use tokio::task::JoinHandle;
use tracing::warn;
use uuid::Uuid;

use crate::cli::input::LineEdit;
use crate::database::models::{CostCategory, Project};
use crate::error::{Error, ValidationError};
use crate::stats::{self, BudgetSummary};
use crate::sync::{
    validate, AuthState, CostDraft, CostRepository, DataStore, IdentityProvider, ProjectDraft,
    ProjectRepository, SessionConfig, SessionManager, VerificationKind,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Loading,
    Auth,
    Projects,
    ProjectForm,
    Detail,
    AddCost,
    Account,
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    #[default]
    SignIn,
    SignUp,
    Reset,
    Verify,
    NewPassword,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthField {
    DisplayName,
    Email,
    Password,
    Confirm,
    Token,
}

impl AuthMode {
    pub fn fields(self) -> &'static [AuthField] {
        use AuthField::*;
        match self {
            Self::SignIn => &[Email, Password],
            Self::SignUp => &[DisplayName, Email, Password, Confirm],
            Self::Reset => &[Email],
            Self::Verify => &[Token],
            Self::NewPassword => &[Password, Confirm],
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::SignIn => "Sign in",
            Self::SignUp => "Create account",
            Self::Reset => "Reset password",
            Self::Verify => "Enter emailed token",
            Self::NewPassword => "Choose a new password",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthForm {
    pub mode: AuthMode,
    pub display_name: LineEdit,
    pub email: LineEdit,
    pub password: LineEdit,
    pub confirm: LineEdit,
    pub token: LineEdit,
    pub token_kind: VerificationKind,
    pub focus: usize,
    pub error: Option<String>,
    pub notice: Option<String>,
}

impl Default for AuthForm {
    fn default() -> Self {
        Self {
            mode: AuthMode::SignIn,
            display_name: LineEdit::default(),
            email: LineEdit::default(),
            password: LineEdit::masked(),
            confirm: LineEdit::masked(),
            token: LineEdit::default(),
            token_kind: VerificationKind::Signup,
            focus: 0,
            error: None,
            notice: None,
        }
    }
}

impl AuthForm {
    pub fn focused(&self) -> AuthField {
        let fields = self.mode.fields();
        fields[self.focus.min(fields.len() - 1)]
    }

    pub fn field(&self, field: AuthField) -> &LineEdit {
        match field {
            AuthField::DisplayName => &self.display_name,
            AuthField::Email => &self.email,
            AuthField::Password => &self.password,
            AuthField::Confirm => &self.confirm,
            AuthField::Token => &self.token,
        }
    }

    fn field_mut(&mut self, field: AuthField) -> &mut LineEdit {
        match field {
            AuthField::DisplayName => &mut self.display_name,
            AuthField::Email => &mut self.email,
            AuthField::Password => &mut self.password,
            AuthField::Confirm => &mut self.confirm,
            AuthField::Token => &mut self.token,
        }
    }

    /// Switches mode, keeping the email but never a typed password.
    pub fn switch(&mut self, mode: AuthMode) {
        self.mode = mode;
        self.focus = 0;
        self.password.clear();
        self.confirm.clear();
        self.token.clear();
        self.error = None;
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProjectForm {
    pub editing: Option<Uuid>,
    pub name: LineEdit,
    pub description: LineEdit,
    pub budget: LineEdit,
    // 0: Name, 1: Description, 2: Budget
    pub focus: usize,
    pub error: Option<String>,
}

impl ProjectForm {
    fn for_project(project: &Project) -> Self {
        let mut form = Self {
            editing: Some(project.id),
            ..Self::default()
        };
        form.name.set(project.name.clone());
        form.description.set(project.description.clone().unwrap_or_default());
        form.budget.set(project.budget.normalize().to_string());
        form
    }

    fn field_mut(&mut self) -> &mut LineEdit {
        match self.focus {
            0 => &mut self.name,
            1 => &mut self.description,
            _ => &mut self.budget,
        }
    }

    fn draft(&self) -> ProjectDraft {
        ProjectDraft {
            name: self.name.value.clone(),
            description: self.description.value.clone(),
            budget: self.budget.value.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CostForm {
    pub amount: LineEdit,
    pub description: LineEdit,
    pub cat_sel: ListState,
    // 0: Category, 1: Amount, 2: Description
    pub focus: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AccountForm {
    pub display_name: LineEdit,
    pub password: LineEdit,
    pub confirm: LineEdit,
    // 0: Display name, 1: New password, 2: Confirm
    pub focus: usize,
    pub error: Option<String>,
    pub notice: Option<String>,
}

impl Default for AccountForm {
    fn default() -> Self {
        Self {
            display_name: LineEdit::default(),
            password: LineEdit::masked(),
            confirm: LineEdit::masked(),
            focus: 0,
            error: None,
            notice: None,
        }
    }
}

impl AccountForm {
    fn field_mut(&mut self) -> &mut LineEdit {
        match self.focus {
            0 => &mut self.display_name,
            1 => &mut self.password,
            _ => &mut self.confirm,
        }
    }
}

fn describe(err: &Error) -> String {
    match err {
        Error::EmailNotConfirmed => {
            format!("{err}. F5 enters the token, F6 sends a new one.")
        }
        other => other.to_string(),
    }
}

fn cycle(current: usize, len: usize, delta: isize) -> usize {
    if len == 0 {
        return 0;
    }
    (current as isize + delta).rem_euclid(len as isize) as usize
}

pub struct App<P, S> {
    pub session: Arc<SessionManager<P>>,
    pub projects: ProjectRepository<S>,
    pub costs: CostRepository<S>,
    pub screen: Screen,
    pub help_return: Screen,
    pub status: String,
    pub quit: bool,
    pub project_sel: ListState,
    pub cost_sel: TableState,
    pub current: Option<Uuid>,
    pub auth: AuthForm,
    pub project_form: ProjectForm,
    pub cost_form: CostForm,
    pub account: AccountForm,
    pub confirm_delete: Option<Uuid>,
}

impl<P: IdentityProvider + 'static, S: DataStore> App<P, S> {
    pub fn new(provider: Arc<P>, store: Arc<S>, config: SessionConfig) -> Self {
        let session = Arc::new(SessionManager::new(provider, config));
        let projects = ProjectRepository::new(Arc::clone(&store), session.subscribe());
        let costs = CostRepository::new(store, session.subscribe());
        Self {
            session,
            projects,
            costs,
            screen: Screen::Loading,
            help_return: Screen::Projects,
            status: "Press ? for help | Ctrl+C to quit".into(),
            quit: false,
            project_sel: ListState::default(),
            cost_sel: TableState::default(),
            current: None,
            auth: AuthForm::default(),
            project_form: ProjectForm::default(),
            cost_form: CostForm::default(),
            account: AccountForm::default(),
            confirm_delete: None,
        }
    }

    /// Starts stored-session recovery in the background. The screen leaves
    /// `Loading` on the next `sync_session` after recovery or the failsafe
    /// settles the state.
    pub fn spawn_recovery(&self) -> JoinHandle<AuthState> {
        let session = Arc::clone(&self.session);
        tokio::spawn(async move { session.initialize().await })
    }

    /// Recovers the stored session, then settles on the first real screen.
    pub async fn start(&mut self) {
        if let Err(err) = self.spawn_recovery().await {
            warn!(error = %err, "session recovery task failed");
        }
        self.sync_session().await;
    }

    /// Follows session transitions: drops cached lists and moves between the
    /// auth screens and the project screens.
    pub async fn sync_session(&mut self) {
        let changed = self.projects.observe_session() | self.costs.observe_session();
        if changed {
            self.project_sel.select(None);
            self.cost_sel.select(None);
            self.current = None;
            self.confirm_delete = None;
        }

        match self.session.state() {
            AuthState::Initializing => self.screen = Screen::Loading,
            AuthState::SignedOut => {
                if self.screen != Screen::Auth {
                    self.screen = Screen::Auth;
                    if self.auth.mode == AuthMode::NewPassword {
                        self.auth.switch(AuthMode::SignIn);
                    }
                }
            }
            AuthState::SignedIn(session) => {
                let on_auth = self.screen == Screen::Auth && self.auth.mode != AuthMode::NewPassword;
                if self.screen == Screen::Loading || on_auth {
                    self.auth = AuthForm::default();
                    self.account = AccountForm::default();
                    self.account.display_name.set(session.user.display_name.clone().unwrap_or_default());
                    self.screen = Screen::Projects;
                    self.status = format!("Signed in as {}", session.user.label());
                    self.load_overview().await;
                }
            }
        }
    }

    /// Projects plus every visible cost, for the budget cards.
    pub async fn load_overview(&mut self) {
        if let Err(e) = self.projects.list().await {
            self.status = format!("Could not load projects: {e}");
        }
        if let Err(e) = self.costs.list(None).await {
            self.status = format!("Could not load costs: {e}");
        }
        if self.costs.categories().is_empty() {
            if let Err(e) = self.costs.list_categories().await {
                self.status = format!("Could not load categories: {e}");
            }
        }
        self.clamp_project_selection();
    }

    fn clamp_project_selection(&mut self) {
        let len = self.projects.projects().len();
        match (len, self.project_sel.selected()) {
            (0, _) => self.project_sel.select(None),
            (n, Some(i)) if i >= n => self.project_sel.select(Some(n - 1)),
            (_, None) => self.project_sel.select(Some(0)),
            _ => {}
        }
    }

    fn clamp_cost_selection(&mut self) {
        let len = self.costs.costs().len();
        match (len, self.cost_sel.selected()) {
            (0, _) => self.cost_sel.select(None),
            (n, Some(i)) if i >= n => self.cost_sel.select(Some(n - 1)),
            (_, None) => self.cost_sel.select(Some(0)),
            _ => {}
        }
    }

    pub fn selected_project(&self) -> Option<&Project> {
        let idx = self.project_sel.selected()?;
        self.projects.projects().get(idx)
    }

    pub fn current_project(&self) -> Option<&Project> {
        self.projects.get(self.current?)
    }

    pub fn summary(&self, project: &Project) -> BudgetSummary {
        BudgetSummary::new(
            project.budget,
            &stats::project_entries(self.costs.costs(), project.id),
        )
    }

    pub fn categories(&self) -> &[CostCategory] {
        self.costs.categories()
    }

    pub fn selected_category(&self) -> Option<&CostCategory> {
        let idx = self.cost_form.cat_sel.selected()?;
        self.categories().get(idx)
    }

    pub async fn handle_key(&mut self, k: KeyEvent) -> anyhow::Result<()> {
        if k.kind != KeyEventKind::Press {
            return Ok(());
        }
        if k.modifiers.contains(KeyModifiers::CONTROL) && k.code == KeyCode::Char('c') {
            self.quit = true;
            return Ok(());
        }

        match self.screen {
            Screen::Loading => {}
            Screen::Auth => self.handle_auth_key(k).await,
            Screen::Projects => self.handle_projects_key(k).await,
            Screen::ProjectForm => self.handle_project_form_key(k).await,
            Screen::Detail => self.handle_detail_key(k).await,
            Screen::AddCost => self.handle_add_cost_key(k).await,
            Screen::Account => self.handle_account_key(k).await,
            Screen::Help => {
                if matches!(k.code, KeyCode::Esc | KeyCode::Char('b') | KeyCode::Char('?')) {
                    self.screen = self.help_return;
                }
            }
        }
        self.sync_session().await;
        Ok(())
    }

    fn show_help(&mut self) {
        self.help_return = self.screen;
        self.screen = Screen::Help;
    }

    // ============= Authentication =============

    async fn handle_auth_key(&mut self, k: KeyEvent) {
        let fields = self.auth.mode.fields().len();
        match k.code {
            KeyCode::F(2) => self.auth.switch(AuthMode::SignIn),
            KeyCode::F(3) => self.auth.switch(AuthMode::SignUp),
            KeyCode::F(4) => self.auth.switch(AuthMode::Reset),
            KeyCode::F(5) => {
                self.auth.switch(AuthMode::Verify);
                self.auth.token_kind = VerificationKind::Signup;
            }
            KeyCode::F(6) => self.resend_confirmation().await,
            KeyCode::F(7) if self.auth.mode == AuthMode::Verify => {
                self.auth.token_kind = match self.auth.token_kind {
                    VerificationKind::Signup => VerificationKind::Recovery,
                    VerificationKind::Recovery => VerificationKind::Signup,
                };
            }
            KeyCode::Esc => match self.auth.mode {
                AuthMode::SignIn => self.quit = true,
                AuthMode::NewPassword => {
                    self.session.sign_out().await.ok();
                    self.auth.switch(AuthMode::SignIn);
                }
                _ => self.auth.switch(AuthMode::SignIn),
            },
            KeyCode::Tab | KeyCode::Down => self.auth.focus = cycle(self.auth.focus, fields, 1),
            KeyCode::BackTab | KeyCode::Up => self.auth.focus = cycle(self.auth.focus, fields, -1),
            KeyCode::Enter => self.submit_auth().await,
            code => {
                let field = self.auth.focused();
                self.auth.field_mut(field).handle(code);
            }
        }
    }

    async fn resend_confirmation(&mut self) {
        match self.session.resend_confirmation(&self.auth.email.value).await {
            Ok(()) => {
                self.auth.error = None;
                self.auth.notice = Some("A new confirmation token is on its way.".into());
            }
            Err(e) => self.auth.error = Some(describe(&e)),
        }
    }

    pub async fn submit_auth(&mut self) {
        let form = self.auth.clone();
        self.auth.error = None;
        match form.mode {
            AuthMode::SignIn => {
                if let Err(e) = self.session.sign_in(&form.email.value, &form.password.value).await {
                    self.auth.password.clear();
                    self.auth.error = Some(describe(&e));
                }
            }
            AuthMode::SignUp => {
                let result = match validate::new_password(&form.password.value, &form.confirm.value) {
                    Ok(()) => {
                        self.session
                            .sign_up(&form.email.value, &form.password.value, &form.display_name.value)
                            .await
                    }
                    Err(e) => Err(e.into()),
                };
                match result {
                    Ok(identity) => {
                        self.auth.switch(AuthMode::Verify);
                        self.auth.token_kind = VerificationKind::Signup;
                        self.auth.notice = Some(format!(
                            "Account created. Confirm {} with the emailed token before signing in.",
                            identity.email
                        ));
                    }
                    Err(e) => self.auth.error = Some(describe(&e)),
                }
            }
            AuthMode::Reset => match self.session.reset_password(&form.email.value).await {
                Ok(()) => {
                    self.auth.switch(AuthMode::Verify);
                    self.auth.token_kind = VerificationKind::Recovery;
                    self.auth.notice = Some("If the address is registered, a recovery token was sent.".into());
                }
                Err(e) => self.auth.error = Some(describe(&e)),
            },
            AuthMode::Verify => {
                let kind = form.token_kind;
                if kind == VerificationKind::Recovery {
                    // stay on the auth screen until the new password is set
                    self.auth.mode = AuthMode::NewPassword;
                }
                match self.session.verify(&form.token.value, kind).await {
                    Ok(_) if kind == VerificationKind::Recovery => {
                        self.auth.switch(AuthMode::NewPassword);
                        self.auth.notice = Some("Token accepted. Choose a new password.".into());
                    }
                    Ok(_) => {}
                    Err(e) => {
                        self.auth.mode = AuthMode::Verify;
                        self.auth.error = Some(describe(&e));
                    }
                }
            }
            AuthMode::NewPassword => {
                match self
                    .session
                    .update_password(&form.password.value, &form.confirm.value)
                    .await
                {
                    Ok(()) => {
                        self.auth = AuthForm::default();
                        self.status = "Password updated.".into();
                    }
                    Err(e) => self.auth.error = Some(describe(&e)),
                }
            }
        }
    }

    // ============= Projects =============

    async fn handle_projects_key(&mut self, k: KeyEvent) {
        if let Some(id) = self.confirm_delete {
            match k.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => {
                    self.confirm_delete = None;
                    self.delete_project(id).await;
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    self.confirm_delete = None;
                    self.status = "Delete cancelled.".into();
                }
                _ => {}
            }
            return;
        }

        let len = self.projects.projects().len();
        match k.code {
            KeyCode::Char('q') => self.quit = true,
            KeyCode::Up => {
                let next = cycle(self.project_sel.selected().unwrap_or(0), len, -1);
                self.project_sel.select((len > 0).then_some(next));
            }
            KeyCode::Down => {
                let next = cycle(self.project_sel.selected().unwrap_or(0), len, 1);
                self.project_sel.select((len > 0).then_some(next));
            }
            KeyCode::Enter => {
                if let Some(id) = self.selected_project().map(|p| p.id) {
                    self.open_project(id).await;
                }
            }
            KeyCode::Char('n') => {
                self.project_form = ProjectForm::default();
                self.screen = Screen::ProjectForm;
            }
            KeyCode::Char('e') => {
                if let Some(form) = self.selected_project().map(ProjectForm::for_project) {
                    self.project_form = form;
                    self.screen = Screen::ProjectForm;
                }
            }
            KeyCode::Char('d') | KeyCode::Delete => {
                if let Some((id, name)) = self.selected_project().map(|p| (p.id, p.name.clone())) {
                    self.status = format!("Delete '{name}' and all its costs? (y/n)");
                    self.confirm_delete = Some(id);
                }
            }
            KeyCode::Char('r') => {
                self.load_overview().await;
                self.status = "Refreshed.".into();
            }
            KeyCode::Char('a') => {
                self.account.error = None;
                self.account.notice = None;
                self.screen = Screen::Account;
            }
            KeyCode::Char('?') => self.show_help(),
            _ => {}
        }
    }

    pub async fn open_project(&mut self, id: Uuid) {
        self.current = Some(id);
        self.screen = Screen::Detail;
        self.cost_sel.select(None);
        if let Err(e) = self.costs.list(Some(id)).await {
            self.status = format!("Could not load costs: {e}");
        }
        self.clamp_cost_selection();
    }

    async fn delete_project(&mut self, id: Uuid) {
        match self.projects.delete(id).await {
            Ok(()) => {
                // the store removed the project's costs too
                if let Err(e) = self.costs.list(None).await {
                    self.status = format!("Could not reload costs: {e}");
                } else {
                    self.status = "Project deleted.".into();
                }
                if self.current == Some(id) {
                    self.current = None;
                }
                self.screen = Screen::Projects;
                self.clamp_project_selection();
            }
            Err(e) => self.status = format!("Delete failed: {e}"),
        }
    }

    async fn handle_project_form_key(&mut self, k: KeyEvent) {
        match k.code {
            KeyCode::Esc => {
                self.project_form = ProjectForm::default();
                self.screen = if self.current.is_some() { Screen::Detail } else { Screen::Projects };
            }
            KeyCode::Tab | KeyCode::Down => self.project_form.focus = cycle(self.project_form.focus, 3, 1),
            KeyCode::BackTab | KeyCode::Up => self.project_form.focus = cycle(self.project_form.focus, 3, -1),
            KeyCode::Enter => self.submit_project().await,
            code => {
                self.project_form.field_mut().handle(code);
            }
        }
    }

    pub async fn submit_project(&mut self) {
        let draft = self.project_form.draft();
        let result = match self.project_form.editing {
            Some(id) => self.projects.update(id, &draft).await,
            None => self.projects.create(&draft).await,
        };
        match result {
            Ok(project) => {
                self.status = match self.project_form.editing {
                    Some(_) => format!("Saved '{}'.", project.name),
                    None => format!("Created '{}'.", project.name),
                };
                self.project_form = ProjectForm::default();
                if self.current == Some(project.id) {
                    self.screen = Screen::Detail;
                } else {
                    self.screen = Screen::Projects;
                    let idx = self.projects.projects().iter().position(|p| p.id == project.id);
                    self.project_sel.select(idx);
                }
            }
            Err(e) => self.project_form.error = Some(e.to_string()),
        }
    }

    // ============= Project detail =============

    async fn handle_detail_key(&mut self, k: KeyEvent) {
        let Some(project_id) = self.current else {
            self.screen = Screen::Projects;
            return;
        };
        let len = self.costs.costs().len();
        match k.code {
            KeyCode::Char('q') => self.quit = true,
            KeyCode::Up => {
                let next = cycle(self.cost_sel.selected().unwrap_or(0), len, -1);
                self.cost_sel.select((len > 0).then_some(next));
            }
            KeyCode::Down => {
                let next = cycle(self.cost_sel.selected().unwrap_or(0), len, 1);
                self.cost_sel.select((len > 0).then_some(next));
            }
            KeyCode::Char('a') => {
                self.cost_form = CostForm {
                    focus: 1,
                    ..CostForm::default()
                };
                if !self.categories().is_empty() {
                    self.cost_form.cat_sel.select(Some(0));
                }
                self.screen = Screen::AddCost;
            }
            KeyCode::Char('x') | KeyCode::Delete => {
                let selected = self.cost_sel.selected().and_then(|i| self.costs.costs().get(i)).map(|c| c.id);
                if let Some(cost_id) = selected {
                    match self.costs.delete(cost_id).await {
                        Ok(()) => self.status = "Cost deleted.".into(),
                        Err(e) => self.status = format!("Delete failed: {e}"),
                    }
                    self.clamp_cost_selection();
                }
            }
            KeyCode::Char('e') => {
                if let Some(form) = self.current_project().map(ProjectForm::for_project) {
                    self.project_form = form;
                    self.screen = Screen::ProjectForm;
                }
            }
            KeyCode::Char('d') => {
                if let Some(name) = self.current_project().map(|p| p.name.clone()) {
                    // the cost snapshot is scoped to this project until reloaded
                    self.current = None;
                    self.screen = Screen::Projects;
                    self.load_overview().await;
                    let idx = self.projects.projects().iter().position(|p| p.id == project_id);
                    self.project_sel.select(idx);
                    self.status = format!("Delete '{name}' and all its costs? (y/n)");
                    self.confirm_delete = Some(project_id);
                }
            }
            KeyCode::Char('r') => self.open_project(project_id).await,
            KeyCode::Esc | KeyCode::Char('b') => {
                self.current = None;
                self.screen = Screen::Projects;
                self.load_overview().await;
            }
            KeyCode::Char('?') => self.show_help(),
            _ => {}
        }
    }

    async fn handle_add_cost_key(&mut self, k: KeyEvent) {
        let categories = self.categories().len();
        match k.code {
            KeyCode::Esc => {
                self.cost_form = CostForm::default();
                self.screen = Screen::Detail;
            }
            KeyCode::Tab => self.cost_form.focus = cycle(self.cost_form.focus, 3, 1),
            KeyCode::BackTab => self.cost_form.focus = cycle(self.cost_form.focus, 3, -1),
            KeyCode::Up | KeyCode::Down if self.cost_form.focus == 0 && categories > 0 => {
                let delta = if k.code == KeyCode::Up { -1 } else { 1 };
                let next = cycle(self.cost_form.cat_sel.selected().unwrap_or(0), categories, delta);
                self.cost_form.cat_sel.select(Some(next));
            }
            KeyCode::Enter => self.submit_cost().await,
            code => match self.cost_form.focus {
                1 => {
                    self.cost_form.amount.handle(code);
                }
                2 => {
                    self.cost_form.description.handle(code);
                }
                _ => {}
            },
        }
    }

    pub async fn submit_cost(&mut self) {
        let Some(project_id) = self.current else {
            self.cost_form.error = Some("No project selected".into());
            return;
        };
        let draft = CostDraft {
            project_id,
            category_id: self.selected_category().map(|c| c.id.clone()),
            amount: self.cost_form.amount.value.clone(),
            description: self.cost_form.description.value.clone(),
        };
        match self.costs.create(&draft).await {
            Ok(entry) => {
                self.status = format!("Recorded '{}'.", entry.description);
                self.cost_form = CostForm::default();
                self.screen = Screen::Detail;
                let idx = self.costs.costs().iter().position(|c| c.id == entry.id);
                self.cost_sel.select(idx);
            }
            Err(Error::Validation(ValidationError::CategoryRequired)) => {
                self.cost_form.focus = 0;
                self.cost_form.error = Some(ValidationError::CategoryRequired.to_string());
            }
            Err(e) => self.cost_form.error = Some(e.to_string()),
        }
    }

    // ============= Account =============

    async fn handle_account_key(&mut self, k: KeyEvent) {
        match k.code {
            KeyCode::Esc => {
                self.account.password.clear();
                self.account.confirm.clear();
                self.screen = Screen::Projects;
            }
            KeyCode::Tab | KeyCode::Down => self.account.focus = cycle(self.account.focus, 3, 1),
            KeyCode::BackTab | KeyCode::Up => self.account.focus = cycle(self.account.focus, 3, -1),
            KeyCode::F(2) => {
                if let Some(session) = self.session.current_session() {
                    match self.session.resend_confirmation(&session.user.email).await {
                        Ok(()) => self.account.notice = Some("Confirmation token sent.".into()),
                        Err(e) => self.account.error = Some(describe(&e)),
                    }
                }
            }
            KeyCode::F(3) => {
                self.session.sign_out().await.ok();
                self.status = "Signed out.".into();
            }
            KeyCode::Enter => self.submit_account().await,
            code => {
                self.account.field_mut().handle(code);
            }
        }
    }

    pub async fn submit_account(&mut self) {
        self.account.error = None;
        self.account.notice = None;
        if self.account.focus == 0 {
            match self.session.update_profile(&self.account.display_name.value) {
                Ok(identity) => {
                    self.account.notice = Some(format!("Display name set to '{}'.", identity.label()));
                }
                Err(e) => self.account.error = Some(e.to_string()),
            }
            return;
        }
        let result = self
            .session
            .update_password(&self.account.password.value, &self.account.confirm.value)
            .await;
        match result {
            Ok(()) => {
                self.account.password.clear();
                self.account.confirm.clear();
                self.account.notice = Some("Password updated.".into());
            }
            Err(e) => self.account.error = Some(e.to_string()),
        }
    }
}
