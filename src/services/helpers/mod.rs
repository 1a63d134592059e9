pub mod docker_helper;
