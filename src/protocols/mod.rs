pub mod desktop_manager;
