pub mod a001_cliente;
