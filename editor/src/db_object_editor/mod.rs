//! Editor back end for schema objects (tables, views, routines, ...).
//!
//! [`DbObjectEditor`] layers database specifics on top of [`BaseEditor`]:
//!
//! - named property setters that record coalescing undo steps and stamp the
//!   object's change date
//! - parser context, syntax validator and a lazily created SQL editor bound
//!   to the target server version
//! - the live-object apply/refresh/close protocol driven by callbacks
//! - latching of validation messages that concern the edited object
//! - catalog, schema and character set queries (see [`catalog`])

pub mod catalog;

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use workbench_core::grt::{GrtObjectRef, MemberChange, Value};
use workbench_core::notifications::{
    DB_OBJECT_EDITOR_CREATED, NotificationInfo, PREFERENCES_DID_CLOSE,
};
use workbench_core::signal::Connection;
use workbench_core::validation::{CLEAR_ALL_TAG, MessageType, ValidationMessage};

use crate::auto_undo::AutoUndoEdit;
use crate::base_editor::{self, BaseEditor, LAST_CHANGE_DATE, ObjectEditor};
use crate::context::EditorContext;
use crate::prompt::PromptChoice;
use crate::refresh_ui::{REFRESH_SQL, REFRESH_TITLE};
use crate::sql::{
    CodeEditorControl, ParserContext, ParserContextSpec, ParserLogEntry, SqlEditor,
    SyntaxValidator,
};
use crate::version::ServerVersion;

pub use catalog::{format_charset_collation, parse_charset_collation, split_qualified_identifier};

/// Custom-data key marking an object as backed by a server connection.
pub const LIVE_RDBMS_KEY: &str = "liveRdbms";
/// Custom-data key holding the object's SQL mode.
pub const SQL_MODE_KEY: &str = "sqlMode";
/// Custom-data key with the identifier case-sensitivity flag.
pub const CASE_SENSITIVE_KEY: &str = "CaseSensitive";

/// Format of [`LAST_CHANGE_DATE`] values.
pub const CHANGE_DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Applies edits to the live object. The flag requests a dry run that only
/// reports whether there is anything to apply.
pub type ApplyCallback = Arc<dyn Fn(&DbObjectEditor, bool) -> bool + Send + Sync>;
pub type EditorCallback = Arc<dyn Fn(&DbObjectEditor) + Send + Sync>;
pub type ParserLogCallback = Arc<dyn Fn(&[ParserLogEntry]) + Send + Sync>;

#[derive(Default)]
struct Callbacks {
    apply_changes: Mutex<Option<ApplyCallback>>,
    refresh_live_object: Mutex<Option<EditorCallback>>,
    create_live_table_stubs: Mutex<Option<EditorCallback>>,
    parser_log: Mutex<Option<ParserLogCallback>>,
}

/// Parser-side collaborators, present only when a server family is known.
struct ParserBinding {
    context: Arc<dyn ParserContext>,
    validator: Arc<dyn SyntaxValidator>,
}

/// Back end of the editor for one schema object.
pub struct DbObjectEditor {
    base: BaseEditor,
    context: EditorContext,
    rdbms: Option<GrtObjectRef>,
    parser: Option<ParserBinding>,
    sql_editor: Mutex<Option<Arc<dyn SqlEditor>>>,
    callbacks: Callbacks,
    parser_log: Mutex<Vec<ParserLogEntry>>,
    last_validation: Mutex<Option<(MessageType, String)>>,
    /// Object id this editor holds an undo tracking reference on.
    undo_tracked: Mutex<Option<String>>,
    _validation_connection: Connection,
}

impl DbObjectEditor {
    /// Creates an editor for `object`.
    ///
    /// `rdbms` describes the server family; when `None` it is taken from the
    /// object's live marker, if any. Without one the editor has no parser.
    pub fn new(
        context: &EditorContext,
        object: GrtObjectRef,
        rdbms: Option<GrtObjectRef>,
    ) -> Arc<Self> {
        let base = BaseEditor::new(context, object.clone());
        for field in &context.config.extra_ignored_fields {
            base.add_ignored_field(field);
        }

        let rdbms = rdbms.or_else(|| object.custom_data(LIVE_RDBMS_KEY).as_object().cloned());
        let parser = rdbms
            .as_ref()
            .and_then(|rdbms| Self::bind_parser(context, &object, rdbms));

        let undo_tracked = track_for_undo(context, &object);

        let editor = Arc::new_cyclic(|weak: &Weak<Self>| {
            let validation_connection = context.validation.signal_notify().connect({
                let weak = weak.clone();
                move |message| {
                    if let Some(editor) = weak.upgrade() {
                        editor.notify_from_validation(message);
                    }
                }
            });

            let weak = weak.clone();
            context.notifications.add_observer(
                base.form_id(),
                PREFERENCES_DID_CLOSE,
                move |notification| {
                    if let Some(editor) = weak.upgrade() {
                        editor.handle_grt_notification(notification.name, notification.info);
                    }
                },
            );

            Self {
                base,
                context: context.clone(),
                rdbms,
                parser,
                sql_editor: Mutex::new(None),
                callbacks: Callbacks::default(),
                parser_log: Mutex::new(Vec::new()),
                last_validation: Mutex::new(None),
                undo_tracked: Mutex::new(undo_tracked),
                _validation_connection: validation_connection,
            }
        });

        log::debug!(
            "{} created for {} '{}'",
            editor.base.form_id(),
            object.class_name(),
            object.name()
        );
        let info = NotificationInfo::new()
            .with("form", editor.base.form_id())
            .with("object", object);
        context
            .notifications
            .send(DB_OBJECT_EDITOR_CREATED, None, info);
        editor
    }

    fn bind_parser(
        context: &EditorContext,
        object: &GrtObjectRef,
        rdbms: &GrtObjectRef,
    ) -> Option<ParserBinding> {
        let Some(services) = context.parser_services.as_ref() else {
            log::debug!("no parser services, editing {} without a parser", object.id());
            return None;
        };

        let catalog = object.find_self_or_ancestor("db.Catalog");
        let charset_owner = catalog.as_ref().unwrap_or(rdbms);
        let charsets = charset_owner
            .object_list("characterSets")
            .iter()
            .map(|cs| cs.name())
            .collect();
        let version = catalog
            .as_ref()
            .and_then(catalog_version)
            .unwrap_or_else(|| context.config.default_version());
        let default_case = i64::from(context.config.case_sensitive);
        let sql_mode = object.custom_string(SQL_MODE_KEY);

        let parser_context = services.create_parser_context(ParserContextSpec {
            charsets,
            version,
            sql_mode: sql_mode.clone(),
            case_sensitive: object.custom_int(CASE_SENSITIVE_KEY, default_case) != 0,
        });
        let validator = services.create_syntax_validator(rdbms);
        if let Some(mode) = sql_mode {
            parser_context.set_sql_mode(&mode);
            validator.set_sql_mode(&mode);
        }
        Some(ParserBinding {
            context: parser_context,
            validator,
        })
    }

    pub fn object(&self) -> GrtObjectRef {
        self.base.object()
    }

    /// Switches the editor to `object`.
    ///
    /// Change subscriptions and undo tracking move along; a live object is
    /// not tracked. The parser binding stays with the original server family.
    pub fn set_object(&self, object: GrtObjectRef) {
        let mut undo_tracked = self.undo_tracked.lock();
        if let Some(previous) = undo_tracked.take() {
            self.context.undo.untrack(&previous);
        }
        *undo_tracked = track_for_undo(&self.context, &object);
        drop(undo_tracked);

        log::debug!(
            "{} now edits {} '{}'",
            self.base.form_id(),
            object.class_name(),
            object.name()
        );
        self.base.set_object(object);
    }

    /// The server family description, if one was resolved.
    pub fn rdbms(&self) -> Option<&GrtObjectRef> {
        self.rdbms.as_ref()
    }

    pub fn parser_context(&self) -> Option<&Arc<dyn ParserContext>> {
        self.parser.as_ref().map(|p| &p.context)
    }

    pub fn syntax_validator(&self) -> Option<&Arc<dyn SyntaxValidator>> {
        self.parser.as_ref().map(|p| &p.validator)
    }

    // -----------------------------------------------------------------------
    // Callbacks
    // -----------------------------------------------------------------------

    /// Installs the live-object apply callback used by
    /// [`apply_changes_to_live_object`](ObjectEditor::apply_changes_to_live_object)
    /// and [`can_close`](ObjectEditor::can_close).
    pub fn set_on_apply_changes_to_live_object(
        &self,
        callback: impl Fn(&DbObjectEditor, bool) -> bool + Send + Sync + 'static,
    ) {
        *self.callbacks.apply_changes.lock() = Some(Arc::new(callback));
    }

    pub fn set_on_refresh_live_object(
        &self,
        callback: impl Fn(&DbObjectEditor) + Send + Sync + 'static,
    ) {
        *self.callbacks.refresh_live_object.lock() = Some(Arc::new(callback));
    }

    /// Installs the callback that loads table stubs of a live catalog before
    /// table names are listed.
    pub fn set_on_create_live_table_stubs(
        &self,
        callback: impl Fn(&DbObjectEditor) + Send + Sync + 'static,
    ) {
        *self.callbacks.create_live_table_stubs.lock() = Some(Arc::new(callback));
    }

    pub fn set_parser_log_callback(
        &self,
        callback: impl Fn(&[ParserLogEntry]) + Send + Sync + 'static,
    ) {
        *self.callbacks.parser_log.lock() = Some(Arc::new(callback));
    }

    fn apply_callback(&self) -> Option<ApplyCallback> {
        self.callbacks.apply_changes.lock().clone()
    }

    pub(crate) fn create_live_table_stubs(&self) {
        let callback = self.callbacks.create_live_table_stubs.lock().clone();
        if let Some(callback) = callback {
            callback(self);
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Whether deleting the object with `object_id` should close this editor.
    pub fn should_close_on_delete_of(&self, object_id: &str) -> bool {
        self.object().id() == object_id || self.schema().is_some_and(|s| s.id() == object_id)
    }

    /// Stamps the edited object with the current local time.
    pub fn update_change_date(&self) {
        let now = chrono::Local::now().format(CHANGE_DATE_FORMAT).to_string();
        self.object().set_member(LAST_CHANGE_DATE, now);
    }

    /// Makes every attached view reload the object.
    pub fn check_sql(&self) {
        self.object().signal_changed().emit(&MemberChange {
            member: String::new(),
            old: Value::None,
        });
    }

    // -----------------------------------------------------------------------
    // Named properties
    // -----------------------------------------------------------------------

    pub fn name(&self) -> String {
        self.object().name()
    }

    /// Renames the object. Surrounding whitespace is dropped.
    pub fn set_name(&self, name: &str) {
        let object = self.object();
        let name = name.trim();
        if object.name() == name {
            return;
        }
        {
            let _blocker = self.base.refresh_ui().block();
            let mut undo = AutoUndoEdit::for_member(self, &object, "name");
            object.set_member("name", name);
            self.update_change_date();
            undo.end(&format!("Rename to '{name}'"));
        }
        self.base.refresh_ui().request_partial_refresh(REFRESH_TITLE);
    }

    pub fn comment(&self) -> String {
        self.object().string_member("comment")
    }

    pub fn set_comment(&self, comment: &str) {
        let object = self.object();
        if object.string_member("comment") == comment {
            return;
        }
        let _blocker = self.base.refresh_ui().block();
        let mut undo = AutoUndoEdit::for_member(self, &object, "comment");
        object.set_member("comment", comment);
        self.update_change_date();
        undo.end("Edit Comment");
    }

    /// SQL definition of DDL objects, empty for everything else.
    pub fn sql(&self) -> String {
        let object = self.object();
        if object.is_instance("db.DatabaseDdlObject") {
            object.string_member("sqlDefinition")
        } else {
            String::new()
        }
    }

    /// Replaces the SQL definition of a DDL object.
    pub fn set_sql(&self, sql: &str) {
        let object = self.object();
        if !object.is_instance("db.DatabaseDdlObject") {
            log::warn!("{} has no SQL definition", object.class_name());
            return;
        }
        if object.string_member("sqlDefinition") == sql {
            return;
        }
        {
            let _blocker = self.base.refresh_ui().block();
            let mut undo = AutoUndoEdit::for_member(self, &object, "sqlDefinition");
            object.set_member("sqlDefinition", sql);
            self.update_change_date();
            undo.end("Edit SQL");
        }
        let editor = self.sql_editor.lock().clone();
        if let Some(editor) = editor
            && editor.text() != sql
        {
            editor.set_text(sql);
        }
        self.check_sql();
        self.base.refresh_ui().request_partial_refresh(REFRESH_SQL);
    }

    pub fn is_sql_commented(&self) -> bool {
        self.object().int_member("commentedOut", 0) != 0
    }

    pub fn set_sql_commented(&self, commented: bool) {
        if self.is_sql_commented() == commented {
            return;
        }
        let object = self.object();
        let _blocker = self.base.refresh_ui().block();
        let mut undo = AutoUndoEdit::for_member(self, &object, "commentedOut");
        object.set_member("commentedOut", i64::from(commented));
        self.update_change_date();
        undo.end("Comment Out SQL");
    }

    pub fn sql_mode(&self) -> Option<String> {
        self.object().custom_string(SQL_MODE_KEY)
    }

    /// Stores a new SQL mode and hands it to the parser collaborators.
    pub fn set_sql_mode(&self, sql_mode: &str) {
        if self.sql_mode().as_deref() == Some(sql_mode) {
            return;
        }
        let object = self.object();
        {
            let _blocker = self.base.refresh_ui().block();
            let mut undo = AutoUndoEdit::for_member(self, &object, SQL_MODE_KEY);
            object.set_custom_data(SQL_MODE_KEY, sql_mode);
            self.update_change_date();
            undo.end("Change SQL Mode");
        }
        if let Some(parser) = &self.parser {
            parser.context.set_sql_mode(sql_mode);
            parser.validator.set_sql_mode(sql_mode);
        }
        let editor = self.sql_editor.lock().clone();
        if let Some(editor) = editor {
            editor.set_sql_mode(sql_mode);
        }
    }

    // -----------------------------------------------------------------------
    // Server version
    // -----------------------------------------------------------------------

    /// Target version of the owning catalog.
    pub fn rdbms_target_version(&self) -> Option<ServerVersion> {
        self.catalog().as_ref().and_then(catalog_version)
    }

    /// Returns `true` when no target version is known.
    pub fn is_server_version_at_least(&self, major: u32, minor: u32) -> bool {
        self.rdbms_target_version()
            .is_none_or(|version| version.is_at_least(major, minor))
    }

    /// Reacts to application notifications. Only a successfully saved
    /// preferences dialog matters: it may have changed the target version.
    pub fn handle_grt_notification(&self, name: &str, info: &NotificationInfo) {
        if name != PREFERENCES_DID_CLOSE || info.get_int("saved", 0) != 1 {
            return;
        }
        let version = self
            .rdbms_target_version()
            .unwrap_or_else(|| self.context.config.default_version());
        log::debug!("{}: target version is now {version}", self.base.form_id());
        if let Some(parser) = &self.parser {
            parser.context.update_server_version(version);
        }
        let editor = self.sql_editor.lock().clone();
        if let Some(editor) = editor {
            editor.set_server_version(version);
        }
    }

    // -----------------------------------------------------------------------
    // SQL editor
    // -----------------------------------------------------------------------

    pub fn has_editor(&self) -> bool {
        self.sql_editor.lock().is_some()
    }

    /// The embedded SQL editor, created on first use. `None` when the editor
    /// has no parser.
    pub fn sql_editor(&self) -> Option<Arc<dyn SqlEditor>> {
        let mut slot = self.sql_editor.lock();
        if let Some(editor) = slot.as_ref() {
            return Some(editor.clone());
        }
        let parser = self.parser.as_ref()?;
        let services = self.context.parser_services.as_ref()?;
        let editor = services.create_sql_editor(parser.context.clone());
        if let Some(mode) = self.sql_mode() {
            editor.set_sql_mode(&mode);
        }
        editor.set_text(&self.sql());
        *slot = Some(editor.clone());
        Some(editor)
    }

    /// Queues a message from the background parser.
    pub fn add_parser_log(&self, entry: ParserLogEntry) {
        self.parser_log.lock().push(entry);
    }

    /// Completion of a background parse: forwards the collected parser log
    /// and refreshes like any other object change.
    pub fn sql_parser_task_finished_cb(&self, _result: Value) {
        let entries = std::mem::take(&mut *self.parser_log.lock());
        let callback = self.callbacks.parser_log.lock().clone();
        if let Some(callback) = callback
            && !entries.is_empty()
        {
            callback(&entries);
        }
        self.base.on_object_changed();
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    /// Latches `message` if it concerns the edited object or one of the
    /// objects it owns.
    pub fn notify_from_validation(&self, message: &ValidationMessage) {
        let object = self.object();
        let pertinent = match &message.object {
            Some(target) => target.same_object(&object) || target.is_owned_by(&object),
            None => message.tag == CLEAR_ALL_TAG,
        };
        if pertinent {
            *self.last_validation.lock() = Some((message.level, message.message.clone()));
        }
    }

    /// Last validation result that concerned this editor.
    pub fn last_validation(&self) -> Option<(MessageType, String)> {
        self.last_validation.lock().clone()
    }
}

fn catalog_version(catalog: &GrtObjectRef) -> Option<ServerVersion> {
    let version = catalog.string_member("version");
    if version.is_empty() {
        return None;
    }
    match version.parse() {
        Ok(version) => Some(version),
        Err(e) => {
            log::warn!("catalog {} has an unusable version: {e}", catalog.id());
            None
        }
    }
}

impl ObjectEditor for DbObjectEditor {
    fn base(&self) -> &BaseEditor {
        &self.base
    }

    fn is_editing_live_object(&self) -> bool {
        self.object().has_custom_data(LIVE_RDBMS_KEY)
    }

    fn refresh_live_object(&self) {
        let callback = self.callbacks.refresh_live_object.lock().clone();
        if let Some(callback) = callback {
            callback(self);
        }
    }

    fn reset_editor_undo_stack(&self) {
        let editor = self.sql_editor.lock().clone();
        if let Some(editor) = editor {
            editor.reset_dirty();
        }
    }

    fn code_editor(&self) -> Option<Arc<dyn CodeEditorControl>> {
        let editor: Arc<dyn CodeEditorControl> = self.sql_editor.lock().clone()?;
        Some(editor)
    }

    fn apply_changes_to_live_object(&self) {
        base_editor::apply_changes(self);
        if let Some(apply) = self.apply_callback()
            && apply(self, false)
        {
            self.refresh_live_object();
        }
    }

    fn can_close(&self) -> bool {
        if !self.is_editing_live_object() {
            return true;
        }
        let baseline = base_editor::can_close(self);
        let Some(apply) = self.apply_callback() else {
            return baseline;
        };
        if !apply(self, true) {
            return true;
        }

        let name = self.name();
        let choice = self.context.prompt.confirm_save(
            &format!("Object {name} was changed"),
            &format!("Do you want to save changes made to {name}?"),
        );
        log::debug!("{}: close prompt answered {choice:?}", self.base.form_id());
        match choice {
            PromptChoice::Save => apply(self, false),
            PromptChoice::Cancel => false,
            PromptChoice::DontSave => true,
        }
    }
}

impl Drop for DbObjectEditor {
    fn drop(&mut self) {
        self.context
            .notifications
            .remove_observers_for(self.base.form_id());
        if let Some(id) = self.undo_tracked.get_mut().take() {
            self.context.undo.untrack(&id);
        }
    }
}

/// Starts undo tracking of a model object. Returns the id to release later,
/// `None` for live objects.
fn track_for_undo(context: &EditorContext, object: &GrtObjectRef) -> Option<String> {
    if object.has_custom_data(LIVE_RDBMS_KEY) {
        return None;
    }
    context.undo.track(object);
    Some(object.id().to_owned())
}

impl fmt::Debug for DbObjectEditor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbObjectEditor")
            .field("base", &self.base)
            .field("has_parser", &self.parser.is_some())
            .field("has_editor", &self.has_editor())
            .finish()
    }
}
