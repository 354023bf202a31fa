mod application;
mod domain;
mod infrastructure;

use application::bootstrap::bootstrap_workspace;
use application::commands::{
    create_habit_impl, create_todo_impl, delete_habit_impl, delete_todo_impl,
    get_focus_schedule_impl, get_focus_state_impl, get_habit_stats_impl, list_habits_impl,
    list_todos_impl, list_widget_todos_impl, set_focus_schedule_impl, sync_widget_todos_impl,
    toggle_habit_completion_impl, toggle_todo_impl, toggle_widget_todo_impl, AppState,
    FocusStateResponse, HabitStatsResponse,
};
use domain::models::{FocusSchedule, Habit, Todo, WidgetTodo};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Serialize)]
struct BootstrapResponse {
    workspace_root: String,
    database_path: String,
    shared_dir: String,
}

#[tauri::command]
fn bootstrap(root: Option<String>) -> Result<BootstrapResponse, String> {
    let workspace_root = match root {
        Some(path) => PathBuf::from(path),
        None => std::env::current_dir().map_err(|error| error.to_string())?,
    };

    let result = bootstrap_workspace(&workspace_root).map_err(|error| error.to_string())?;
    Ok(BootstrapResponse {
        workspace_root: result.workspace_root.display().to_string(),
        database_path: result.database_path.display().to_string(),
        shared_dir: result.shared_dir.display().to_string(),
    })
}

#[tauri::command]
fn ping() -> &'static str {
    "pong"
}

#[tauri::command]
fn list_todos(state: tauri::State<'_, AppState>) -> Result<Vec<Todo>, String> {
    list_todos_impl(state.inner()).map_err(|error| state.command_error("list_todos", &error))
}

#[tauri::command]
fn create_todo(state: tauri::State<'_, AppState>, title: String) -> Result<Todo, String> {
    create_todo_impl(state.inner(), title)
        .map_err(|error| state.command_error("create_todo", &error))
}

#[tauri::command]
fn toggle_todo(state: tauri::State<'_, AppState>, todo_id: String) -> Result<Todo, String> {
    toggle_todo_impl(state.inner(), todo_id)
        .map_err(|error| state.command_error("toggle_todo", &error))
}

#[tauri::command]
fn delete_todo(state: tauri::State<'_, AppState>, todo_id: String) -> Result<bool, String> {
    delete_todo_impl(state.inner(), todo_id)
        .map_err(|error| state.command_error("delete_todo", &error))
}

#[tauri::command]
fn sync_widget_todos(state: tauri::State<'_, AppState>) -> Result<Vec<Todo>, String> {
    sync_widget_todos_impl(state.inner())
        .map_err(|error| state.command_error("sync_widget_todos", &error))
}

#[tauri::command]
fn toggle_widget_todo(state: tauri::State<'_, AppState>, todo_id: String) -> Result<(), String> {
    toggle_widget_todo_impl(state.inner(), todo_id)
        .map_err(|error| state.command_error("toggle_widget_todo", &error))
}

#[tauri::command]
fn list_widget_todos(state: tauri::State<'_, AppState>) -> Result<Vec<WidgetTodo>, String> {
    list_widget_todos_impl(state.inner())
        .map_err(|error| state.command_error("list_widget_todos", &error))
}

#[tauri::command]
fn create_habit(state: tauri::State<'_, AppState>, name: String) -> Result<Habit, String> {
    create_habit_impl(state.inner(), name)
        .map_err(|error| state.command_error("create_habit", &error))
}

#[tauri::command]
fn list_habits(state: tauri::State<'_, AppState>) -> Result<Vec<Habit>, String> {
    list_habits_impl(state.inner()).map_err(|error| state.command_error("list_habits", &error))
}

#[tauri::command]
fn delete_habit(state: tauri::State<'_, AppState>, habit_id: String) -> Result<bool, String> {
    delete_habit_impl(state.inner(), habit_id)
        .map_err(|error| state.command_error("delete_habit", &error))
}

#[tauri::command]
fn toggle_habit_completion(
    state: tauri::State<'_, AppState>,
    habit_id: String,
    date: String,
) -> Result<Habit, String> {
    toggle_habit_completion_impl(state.inner(), habit_id, date)
        .map_err(|error| state.command_error("toggle_habit_completion", &error))
}

#[tauri::command]
fn get_habit_stats(
    state: tauri::State<'_, AppState>,
    habit_id: String,
    reference_date: Option<String>,
) -> Result<HabitStatsResponse, String> {
    get_habit_stats_impl(state.inner(), habit_id, reference_date)
        .map_err(|error| state.command_error("get_habit_stats", &error))
}

#[tauri::command]
fn get_focus_schedule(state: tauri::State<'_, AppState>) -> Result<FocusSchedule, String> {
    get_focus_schedule_impl(state.inner())
        .map_err(|error| state.command_error("get_focus_schedule", &error))
}

#[tauri::command]
fn set_focus_schedule(
    state: tauri::State<'_, AppState>,
    start: String,
    end: String,
    enabled: bool,
) -> Result<FocusSchedule, String> {
    set_focus_schedule_impl(state.inner(), start, end, enabled)
        .map_err(|error| state.command_error("set_focus_schedule", &error))
}

#[tauri::command]
fn get_focus_state(state: tauri::State<'_, AppState>) -> Result<FocusStateResponse, String> {
    get_focus_state_impl(state.inner())
        .map_err(|error| state.command_error("get_focus_state", &error))
}

pub fn run() {
    let workspace_root = std::env::current_dir().expect("failed to resolve current directory");
    let app_state = AppState::new(workspace_root).expect("failed to initialize app state");

    tauri::Builder::default()
        .manage(app_state)
        .invoke_handler(tauri::generate_handler![
            ping,
            bootstrap,
            list_todos,
            create_todo,
            toggle_todo,
            delete_todo,
            sync_widget_todos,
            toggle_widget_todo,
            list_widget_todos,
            create_habit,
            list_habits,
            delete_habit,
            toggle_habit_completion,
            get_habit_stats,
            get_focus_schedule,
            set_focus_schedule,
            get_focus_state
        ])
        .run(tauri::generate_context!())
        .expect("failed to run tauri app");
}
