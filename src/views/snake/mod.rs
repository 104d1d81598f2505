pub mod snake_screen;
